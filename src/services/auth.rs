//! Auth service
//!
//! Sign-up, sign-in, sign-out and session lifecycle. This is the only writer
//! of the [`SessionStore`]: every successful operation publishes the
//! resulting session (or its absence) so the route guard and the group
//! screens follow along.

use crate::config::SessionConfig;
use crate::db::repositories::{SessionRepository, UserConflict, UserRepository};
use crate::models::{AuthSession, Session, User};
use crate::services::password::{hash_password, verify_against_dummy, verify_password};
use crate::services::session_store::SessionStore;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Error types for auth operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Input failed validation
    #[error("Validation error: {0}")]
    InvalidInput(String),

    /// Unknown login or wrong password (indistinguishable on purpose)
    #[error("Authentication failed: {0}")]
    InvalidCredentials(String),

    /// Username or email already registered
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Session expired")]
    SessionExpired,

    /// Store failure
    #[error("Auth store unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),
}

impl AuthError {
    /// Message suitable for showing next to the form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidInput(msg)
            | AuthError::InvalidCredentials(msg)
            | AuthError::UserExists(msg) => msg.clone(),
            AuthError::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            AuthError::Unavailable(e) => format!("Something went wrong: {e}"),
        }
    }
}

/// Input for sign-up
#[derive(Debug, Clone, Default)]
pub struct SignUpInput {
    pub email: String,
    pub username: String,
    pub password: String,
    /// Falls back to the username when blank
    pub display_name: Option<String>,
}

impl SignUpInput {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Input for sign-in; `login` is a username or an email
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

/// Auth service
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    store: SessionStore,
    config: SessionConfig,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        store: SessionStore,
        config: SessionConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            store,
            config,
        }
    }

    /// The store this service publishes to
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Register a new user and sign them in.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty field, a malformed email or a short password
    /// - `UserExists` if the username or email is taken
    /// - `Unavailable` for store failures
    pub async fn sign_up(&self, input: SignUpInput) -> Result<AuthSession, AuthError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        self.validate_sign_up(&username, &email, &input.password)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(AuthError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password)?;
        // A concurrent sign-up can still win the race past the checks above
        let user = match self
            .user_repo
            .create(&User::new(username, email, input.display_name, password_hash))
            .await
        {
            Ok(user) => user,
            Err(e) => {
                if let Some(conflict) = e.downcast_ref::<UserConflict>() {
                    tracing::info!(username = %conflict.username, "Sign-up lost a race for a unique field");
                    return Err(AuthError::UserExists(
                        "Username or email is already registered".to_string(),
                    ));
                }
                return Err(AuthError::Unavailable(e.context("Failed to create user")));
            }
        };

        tracing::info!(user_id = user.id, username = %user.username, "User signed up");

        self.open_session(&user).await
    }

    /// Sign in with a username or email.
    ///
    /// Unknown logins and wrong passwords produce the same error and take
    /// comparable time.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<AuthSession, AuthError> {
        let login = credentials.login.trim();
        if login.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Enter your username or email and your password".to_string(),
            ));
        }

        let Some(user) = self.find_user_by_login(login).await? else {
            verify_against_dummy(&credentials.password);
            tracing::info!("Sign-in rejected: unknown login");
            return Err(AuthError::InvalidCredentials(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password(&credentials.password, &user.password_hash)? {
            tracing::info!(user_id = user.id, "Sign-in rejected: wrong password");
            return Err(AuthError::InvalidCredentials(INVALID_CREDENTIALS.to_string()));
        }

        tracing::info!(user_id = user.id, "User signed in");
        self.open_session(&user).await
    }

    /// Revoke the current session. A no-op when nobody is signed in.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(current) = self.store.try_current_session() else {
            return Ok(());
        };

        self.session_repo
            .delete(&current.token)
            .await
            .context("Failed to delete session")?;

        tracing::info!(user_id = current.user_id(), "User signed out");
        self.store.publish(None);
        Ok(())
    }

    /// Restore a persisted token at app start, then mark the store initialized.
    ///
    /// Unknown or expired tokens restore to "signed out"; expired rows are
    /// deleted. The store is initialized even when the lookup fails.
    pub async fn restore(&self, token: Option<&str>) -> Result<Option<AuthSession>, AuthError> {
        let restored = match token {
            Some(token) => self.validate_token(token).await,
            None => Ok(None),
        };

        match restored {
            Ok(session) => {
                tracing::info!(signed_in = session.is_some(), "Session restored");
                self.store.publish(session.clone());
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session restore failed, continuing signed out");
                self.store.publish(None);
                Err(e)
            }
        }
    }

    /// Rotate the current credential: new token and expiry, old row deleted.
    ///
    /// Fails with `SessionExpired` (and publishes "signed out") when there is
    /// no live credential to rotate.
    pub async fn refresh(&self) -> Result<AuthSession, AuthError> {
        let Some(current) = self.store.try_current_session() else {
            return Err(AuthError::SessionExpired);
        };

        let Some(user) = self.resolve_token(&current.token).await? else {
            tracing::info!(user_id = current.user_id(), "Refresh rejected: session expired");
            self.store.publish(None);
            return Err(AuthError::SessionExpired);
        };

        let session = self.create_session(user.id).await?;
        self.session_repo
            .delete(&current.token)
            .await
            .context("Failed to delete rotated session")?;

        let refreshed = AuthSession::new(&session, user.identity());
        tracing::debug!(user_id = user.id, "Session refreshed");
        self.store.publish(Some(refreshed.clone()));
        Ok(refreshed)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, AuthError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        if count > 0 {
            tracing::info!(count, "Removed expired sessions");
        }
        Ok(count)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    fn validate_sign_up(&self, username: &str, email: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::InvalidInput("Username cannot be empty".to_string()));
        }

        if email.is_empty() {
            return Err(AuthError::InvalidInput("Email cannot be empty".to_string()));
        }

        if !email.contains('@') {
            return Err(AuthError::InvalidInput("Invalid email format".to_string()));
        }

        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password cannot be empty".to_string()));
        }

        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::InvalidInput(format!(
                "Password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        Ok(())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AuthError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(login)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(login)
            .await
            .context("Failed to get user by email")?;

        Ok(user)
    }

    /// User behind a live token; expired rows are deleted on the way
    async fn resolve_token(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?;

        Ok(user)
    }

    async fn validate_token(&self, token: &str) -> Result<Option<AuthSession>, AuthError> {
        let Some(user) = self.resolve_token(token).await? else {
            return Ok(None);
        };

        let session = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to reload session")?;

        Ok(session.map(|s| AuthSession::new(&s, user.identity())))
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, AuthError> {
        let now = Utc::now();
        let expires_at = Duration::try_days(self.config.expiration_days)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "session lifetime of {} days is out of range",
                    self.config.expiration_days
                )
            })?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at,
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }

    async fn open_session(&self, user: &User) -> Result<AuthSession, AuthError> {
        let session = self.create_session(user.id).await?;
        let auth = AuthSession::new(&session, user.identity());
        self.store.publish(Some(auth.clone()));
        Ok(auth)
    }
}
