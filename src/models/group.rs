//! Group and membership models
//!
//! A group is created by exactly one user, who becomes its first admin.
//! Memberships bind one user to one group; the store allows at most one
//! membership per `(group_id, user_id)` pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Group entity as stored in the `groups` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    /// Trimmed, non-empty
    pub name: String,
    /// Unique, always stored uppercase
    pub invite_code: String,
    /// User id of the creator
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    /// Normalized invite code; uniqueness is checked by the store
    pub invite_code: String,
    pub created_by: i64,
}

/// Membership entity as stored in the `group_members` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// Access role of a member within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Group creator
    Admin,
    /// Joined through an invite code
    #[default]
    Member,
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRole::Admin => write!(f, "admin"),
            MemberRole::Member => write!(f, "member"),
        }
    }
}

impl FromStr for MemberRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            _ => Err(anyhow::anyhow!("Invalid member role: {}", s)),
        }
    }
}

/// One row of "my groups": a membership joined with its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupListItem {
    pub id: i64,
    pub name: String,
    pub invite_code: String,
    pub role: MemberRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        assert_eq!("admin".parse::<MemberRole>().unwrap(), MemberRole::Admin);
        assert_eq!("Member".parse::<MemberRole>().unwrap(), MemberRole::Member);
        assert_eq!(MemberRole::Admin.to_string(), "admin");
        assert!("owner".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_list_item_serializes_role_lowercase() {
        let item = GroupListItem {
            id: 1,
            name: "Friday League".into(),
            invite_code: "K4P9QZ".into(),
            role: MemberRole::Admin,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["invite_code"], "K4P9QZ");
    }
}
