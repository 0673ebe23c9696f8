//! Data models
//!
//! Entities shared by the store, the services and the screen models:
//! - Identity entities (User, Session, AuthSession)
//! - Group entities (Group, Membership, GroupListItem)

mod group;
mod session;
mod user;

pub use group::{Group, GroupListItem, MemberRole, Membership, NewGroup};
pub use session::{AuthSession, Session};
pub use user::{resolve_display_name, Identity, User};
