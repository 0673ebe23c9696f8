//! Pickup - groups for pickup games
//!
//! Sign-in, group creation with invite codes, joining by code and the
//! "my groups" listing, plus the route guard that keeps signed-out users in
//! the auth screens.

pub mod config;
pub mod db;
pub mod models;
pub mod screens;
pub mod services;
