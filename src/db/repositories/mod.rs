//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for one entity family.

pub mod group;
pub mod session;
pub mod user;

pub use group::{
    GroupCreation, GroupRepository, InviteCodeConflict, MemberInsert, SqlxGroupRepository,
};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserConflict, UserRepository};
