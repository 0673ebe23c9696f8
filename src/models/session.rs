//! Session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Credential row in the `sessions` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    /// Associated user ID
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// A live, present session: the credential plus the identity it proves.
///
/// This is what the session store publishes and what the route guard and
/// the membership service read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Opaque bearer token
    pub token: String,
    pub user: Identity,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(session: &Session, user: Identity) -> Self {
        Self {
            token: session.id.clone(),
            user,
            expires_at: session.expires_at,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
