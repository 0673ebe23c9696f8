//! Database layer
//!
//! The relational store behind the client core. It supports:
//! - SQLite (default, embedded)
//! - MySQL (shared deployments)
//!
//! The driver is selected by configuration. Repositories see the backend
//! through the `DatabasePool` trait and never depend on a concrete pool type.
//!
//! # Usage
//!
//! ```ignore
//! use pickup::config::DatabaseConfig;
//! use pickup::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
