//! User repository
//!
//! Database operations for registered users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Returned (inside `anyhow::Error`) when the username or email is already registered.
#[derive(Debug, thiserror::Error)]
#[error("username '{username}' or email '{email}' is already registered")]
pub struct UserConflict {
    pub username: String,
    pub email: String,
}

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    ///
    /// Fails with [`UserConflict`] when the username or email is taken.
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username (exact, case-sensitive match)
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Count total users
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, display_name, password_hash, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend()? {
            Backend::Sqlite(p) => create_user_sqlite(p, user).await,
            Backend::Mysql(p) => create_user_mysql(p, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        match self.pool.backend()? {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get user by ID")?;
                Ok(row.as_ref().map(row_to_user_sqlite))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get user by ID")?;
                Ok(row.as_ref().map(row_to_user_mysql))
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        match self.pool.backend()? {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get user by username")?;
                Ok(row.as_ref().map(row_to_user_sqlite))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get user by username")?;
                Ok(row.as_ref().map(row_to_user_mysql))
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        match self.pool.backend()? {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get user by email")?;
                Ok(row.as_ref().map(row_to_user_sqlite))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(p)
                    .await
                    .context("Failed to get user by email")?;
                Ok(row.as_ref().map(row_to_user_mysql))
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(p)
                .await
                .context("Failed to count users")?,
            Backend::Mysql(p) => sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(p)
                .await
                .context("Failed to count users")?,
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, display_name, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| user_insert_error(e, user))?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn user_insert_error(err: sqlx::Error, user: &User) -> anyhow::Error {
    let unique = err
        .as_database_error()
        .map_or(false, |db_err| db_err.is_unique_violation());
    if unique {
        UserConflict {
            username: user.username.clone(),
            email: user.email.clone(),
        }
        .into()
    } else {
        anyhow::Error::new(err).context("Failed to create user")
    }
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, display_name, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| user_insert_error(e, user))?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
