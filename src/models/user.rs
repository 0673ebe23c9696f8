//! User model
//!
//! A registered identity. `id` is assigned by the store and never changes;
//! `username` is unique and compared case-sensitively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity as stored in the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique, case-sensitive)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Name shown to other members
    pub display_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet stored user.
    ///
    /// A blank `display_name` falls back to the username. The password must
    /// already be hashed (see `services::password::hash_password`).
    pub fn new(
        username: String,
        email: String,
        display_name: Option<String>,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        let display_name = resolve_display_name(display_name.as_deref(), &username);
        Self {
            id: 0, // Assigned by the store
            username,
            email,
            display_name,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// The public identity carried by an authenticated session
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Identity reference held by a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub display_name: String,
}

/// Display name to store: the trimmed input, or the username when blank.
pub fn resolve_display_name(display_name: Option<&str>, username: &str) -> String {
    match display_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => username.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_display_name_defaults_to_username() {
        let user = User::new("keeper".into(), "k@example.com".into(), Some("   ".into()), "h".into());
        assert_eq!(user.display_name, "keeper");

        let user = User::new("keeper".into(), "k@example.com".into(), None, "h".into());
        assert_eq!(user.display_name, "keeper");
    }

    #[test]
    fn test_display_name_is_trimmed() {
        assert_eq!(resolve_display_name(Some("  Sam G. "), "sam"), "Sam G.");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("sam".into(), "sam@example.com".into(), None, "secret-hash".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"display_name\":\"sam\""));
    }
}
