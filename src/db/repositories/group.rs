//! Group repository
//!
//! Database operations for groups and their memberships.
//!
//! This module provides:
//! - `GroupRepository` trait defining the interface for group/membership access
//! - `SqlxGroupRepository` implementing the trait for SQLite and MySQL
//!
//! The store enforces both uniqueness rules: `groups.invite_code` and the
//! `(group_id, user_id)` membership pair. Callers learn about a violation
//! through typed outcomes instead of raw database errors.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Group, GroupListItem, MemberRole, Membership, NewGroup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Result of creating a group together with its admin membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCreation {
    /// Group and admin membership both exist
    Created(Group),
    /// The group row exists but the creator could not be attached.
    ///
    /// Only stores without cross-table atomicity report this; the SQL
    /// implementation rolls back instead.
    PartiallyCreated { group: Group, reason: String },
}

/// Result of inserting a membership row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberInsert {
    Inserted(Membership),
    /// A membership for the pair already exists (unique constraint hit)
    Conflict,
}

/// Returned (inside `anyhow::Error`) when an invite code is already taken.
#[derive(Debug, thiserror::Error)]
#[error("invite code '{0}' is already in use")]
pub struct InviteCodeConflict(pub String);

/// Group repository trait
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert a group and its creator's admin membership as one unit.
    ///
    /// Fails with [`InviteCodeConflict`] when `group.invite_code` is taken.
    async fn create_with_admin(&self, group: &NewGroup) -> Result<GroupCreation>;

    /// Get group by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Group>>;

    /// Groups whose invite code equals `code`, at most two rows.
    ///
    /// A second row only appears in a store missing the unique constraint;
    /// it lets callers detect ambiguity without fetching everything.
    async fn find_by_invite_code(&self, code: &str) -> Result<Vec<Group>>;

    /// Membership for the pair, if any
    async fn get_membership(&self, group_id: i64, user_id: i64) -> Result<Option<Membership>>;

    /// Insert a membership; a duplicate pair yields [`MemberInsert::Conflict`]
    async fn add_member(&self, group_id: i64, user_id: i64, role: MemberRole)
        -> Result<MemberInsert>;

    /// Every membership of `user_id` joined with its group
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<GroupListItem>>;

    /// Number of memberships in a group
    async fn count_members(&self, group_id: i64) -> Result<i64>;

    /// Number of groups in the store
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based group repository implementation
pub struct SqlxGroupRepository {
    pool: DynDatabasePool,
}

impl SqlxGroupRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_GROUP: &str = r#"
    INSERT INTO `groups` (name, invite_code, created_by, created_at)
    VALUES (?, ?, ?, ?)
"#;

const INSERT_MEMBER: &str = r#"
    INSERT INTO group_members (group_id, user_id, role, created_at)
    VALUES (?, ?, ?, ?)
"#;

const SELECT_GROUP_BY_ID: &str = r#"
    SELECT id, name, invite_code, created_by, created_at
    FROM `groups`
    WHERE id = ?
"#;

const SELECT_GROUPS_BY_CODE: &str = r#"
    SELECT id, name, invite_code, created_by, created_at
    FROM `groups`
    WHERE invite_code = ?
    ORDER BY id
    LIMIT 2
"#;

const SELECT_MEMBERSHIP: &str = r#"
    SELECT id, group_id, user_id, role, created_at
    FROM group_members
    WHERE group_id = ? AND user_id = ?
"#;

const SELECT_USER_GROUPS: &str = r#"
    SELECT g.id, g.name, g.invite_code, m.role
    FROM group_members m
    INNER JOIN `groups` g ON g.id = m.group_id
    WHERE m.user_id = ?
    ORDER BY m.created_at, m.id
"#;

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn create_with_admin(&self, group: &NewGroup) -> Result<GroupCreation> {
        match self.pool.backend()? {
            Backend::Sqlite(p) => create_with_admin_sqlite(p, group).await,
            Backend::Mysql(p) => create_with_admin_mysql(p, group).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        let group = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(SELECT_GROUP_BY_ID)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get group by ID")?
                .as_ref()
                .map(row_to_group_sqlite),
            Backend::Mysql(p) => sqlx::query(SELECT_GROUP_BY_ID)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get group by ID")?
                .as_ref()
                .map(row_to_group_mysql),
        };
        Ok(group)
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Vec<Group>> {
        let groups = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(SELECT_GROUPS_BY_CODE)
                .bind(code)
                .fetch_all(p)
                .await
                .context("Failed to look up invite code")?
                .iter()
                .map(row_to_group_sqlite)
                .collect(),
            Backend::Mysql(p) => sqlx::query(SELECT_GROUPS_BY_CODE)
                .bind(code)
                .fetch_all(p)
                .await
                .context("Failed to look up invite code")?
                .iter()
                .map(row_to_group_mysql)
                .collect(),
        };
        Ok(groups)
    }

    async fn get_membership(&self, group_id: i64, user_id: i64) -> Result<Option<Membership>> {
        match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(SELECT_MEMBERSHIP)
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(p)
                .await
                .context("Failed to get membership")?
                .as_ref()
                .map(row_to_membership_sqlite)
                .transpose(),
            Backend::Mysql(p) => sqlx::query(SELECT_MEMBERSHIP)
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(p)
                .await
                .context("Failed to get membership")?
                .as_ref()
                .map(row_to_membership_mysql)
                .transpose(),
        }
    }

    async fn add_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<MemberInsert> {
        let now = Utc::now();
        let inserted = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(INSERT_MEMBER)
                .bind(group_id)
                .bind(user_id)
                .bind(role.to_string())
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(p) => sqlx::query(INSERT_MEMBER)
                .bind(group_id)
                .bind(user_id)
                .bind(role.to_string())
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.last_insert_id() as i64),
        };

        match inserted {
            Ok(id) => Ok(MemberInsert::Inserted(Membership {
                id,
                group_id,
                user_id,
                role,
                created_at: now,
            })),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(group_id, user_id, "Membership insert hit unique constraint");
                Ok(MemberInsert::Conflict)
            }
            Err(e) => Err(e).context("Failed to add group member"),
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<GroupListItem>> {
        match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query(SELECT_USER_GROUPS)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to list groups for user")?
                .iter()
                .map(|row| -> Result<GroupListItem> {
                    Ok(GroupListItem {
                        id: row.get("id"),
                        name: row.get("name"),
                        invite_code: row.get("invite_code"),
                        role: MemberRole::from_str(row.get("role"))?,
                    })
                })
                .collect(),
            Backend::Mysql(p) => sqlx::query(SELECT_USER_GROUPS)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to list groups for user")?
                .iter()
                .map(|row| -> Result<GroupListItem> {
                    Ok(GroupListItem {
                        id: row.get("id"),
                        name: row.get("name"),
                        invite_code: row.get("invite_code"),
                        role: MemberRole::from_str(row.get("role"))?,
                    })
                })
                .collect(),
        }
    }

    async fn count_members(&self, group_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM group_members WHERE group_id = ?";
        let count: i64 = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query_scalar(sql).bind(group_id).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar(sql).bind(group_id).fetch_one(p).await,
        }
        .context("Failed to count group members")?;
        Ok(count)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM `groups`";
        let count: i64 = match self.pool.backend()? {
            Backend::Sqlite(p) => sqlx::query_scalar(sql).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar(sql).fetch_one(p).await,
        }
        .context("Failed to count groups")?;
        Ok(count)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db_err| db_err.is_unique_violation())
}

fn created_group(group: &NewGroup, id: i64, created_at: DateTime<Utc>) -> Group {
    Group {
        id,
        name: group.name.clone(),
        invite_code: group.invite_code.clone(),
        created_by: group.created_by,
        created_at,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_with_admin_sqlite(pool: &SqlitePool, group: &NewGroup) -> Result<GroupCreation> {
    let now = Utc::now();
    // Dropping `tx` without commit rolls both inserts back
    let mut tx = pool.begin().await.context("Failed to begin group transaction")?;

    let group_id = match sqlx::query(INSERT_GROUP)
        .bind(&group.name)
        .bind(&group.invite_code)
        .bind(group.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
    {
        Ok(result) => result.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(InviteCodeConflict(group.invite_code.clone()).into())
        }
        Err(e) => return Err(e).context("Failed to insert group"),
    };

    sqlx::query(INSERT_MEMBER)
        .bind(group_id)
        .bind(group.created_by)
        .bind(MemberRole::Admin.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to attach group creator as admin")?;

    tx.commit().await.context("Failed to commit group creation")?;

    Ok(GroupCreation::Created(created_group(group, group_id, now)))
}

fn row_to_group_sqlite(row: &sqlx::sqlite::SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        name: row.get("name"),
        invite_code: row.get("invite_code"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

fn row_to_membership_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Membership> {
    Ok(Membership {
        id: row.get("id"),
        group_id: row.get("group_id"),
        user_id: row.get("user_id"),
        role: MemberRole::from_str(row.get("role"))?,
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_with_admin_mysql(pool: &MySqlPool, group: &NewGroup) -> Result<GroupCreation> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin group transaction")?;

    let group_id = match sqlx::query(INSERT_GROUP)
        .bind(&group.name)
        .bind(&group.invite_code)
        .bind(group.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
    {
        Ok(result) => result.last_insert_id() as i64,
        Err(e) if is_unique_violation(&e) => {
            return Err(InviteCodeConflict(group.invite_code.clone()).into())
        }
        Err(e) => return Err(e).context("Failed to insert group"),
    };

    sqlx::query(INSERT_MEMBER)
        .bind(group_id)
        .bind(group.created_by)
        .bind(MemberRole::Admin.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to attach group creator as admin")?;

    tx.commit().await.context("Failed to commit group creation")?;

    Ok(GroupCreation::Created(created_group(group, group_id, now)))
}

fn row_to_group_mysql(row: &sqlx::mysql::MySqlRow) -> Group {
    Group {
        id: row.get("id"),
        name: row.get("name"),
        invite_code: row.get("invite_code"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

fn row_to_membership_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Membership> {
    Ok(Membership {
        id: row.get("id"),
        group_id: row.get("group_id"),
        user_id: row.get("user_id"),
        role: MemberRole::from_str(row.get("role"))?,
        created_at: row.get("created_at"),
    })
}
