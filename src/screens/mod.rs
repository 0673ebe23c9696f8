//! Screen models
//!
//! UI-independent state holders for the group screens. Each exposes its
//! state through a `watch` channel; a view renders whatever it last saw.

pub mod group_form;
pub mod groups;

pub use group_form::{FormAction, FormMessage, FormOutcome, FormState, GroupActionForm};
pub use groups::{GroupsScreen, GroupsState};
