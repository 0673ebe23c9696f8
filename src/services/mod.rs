//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing the sign-in, group and membership rules
//! - Coordinating between repositories and the session store
//! - Handling validation and error cases

pub mod action_gate;
pub mod auth;
pub mod group_listing;
pub mod invite_code;
pub mod membership;
pub mod password;
pub mod route_guard;
pub mod session_store;

pub use action_gate::{ActionGate, ActionTicket};
pub use auth::{AuthError, AuthService, Credentials, SignUpInput};
pub use group_listing::GroupListingProjector;
pub use invite_code::{generate_invite_code, normalize_invite_code};
pub use membership::{GroupDetail, JoinOutcome, MembershipError, MembershipService};
pub use password::{hash_password, verify_password};
pub use route_guard::{decide, GuardDriver, NavAction, Navigator, RouteGuard, RouteSegment};
pub use session_store::{ListenerHandle, SessionSnapshot, SessionStore, SessionSubscription};
