//! Session repository
//!
//! Credential rows backing authenticated sessions.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SESSION: &str = r#"
    INSERT INTO sessions (id, user_id, expires_at, created_at)
    VALUES (?, ?, ?, ?)
"#;

const SELECT_SESSION: &str = r#"
    SELECT id, user_id, expires_at, created_at
    FROM sessions
    WHERE id = ?
"#;

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.backend()? {
            Backend::Sqlite(p) => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(p)
                    .await
                    .map(|_| ())
            }
            Backend::Mysql(p) => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(p)
                    .await
                    .map(|_| ())
            }
        }
        .context("Failed to create session")?;

        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let session = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(SELECT_SESSION)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get session by ID")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
            Backend::Mysql(p) => sqlx::query(SELECT_SESSION)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get session by ID")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
        };

        Ok(session)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(sql).bind(id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(id).execute(p).await.map(|_| ()),
        }
        .context("Failed to delete session")
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE user_id = ?";
        match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(sql).bind(user_id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(user_id).execute(p).await.map(|_| ()),
        }
        .context("Failed to delete sessions by user")
    }

    async fn delete_expired(&self) -> Result<i64> {
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        let now = Utc::now();
        let affected = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete expired sessions")?;

        Ok(affected as i64)
    }
}
