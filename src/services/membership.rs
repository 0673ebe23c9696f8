//! Membership service
//!
//! Creating groups, joining them through invite codes and reading one group
//! as a member. Every operation acts as the user currently held by the
//! [`SessionStore`].
//!
//! The store is the source of truth for both uniqueness rules. The
//! membership pre-check in [`MembershipService::join_group`] only saves a
//! round trip; a concurrent join that slips past it lands on the
//! `(group_id, user_id)` constraint and is reported as "already a member".

use crate::config::InviteConfig;
use crate::db::repositories::{GroupCreation, GroupRepository, InviteCodeConflict, MemberInsert};
use crate::models::{Group, MemberRole, Membership, NewGroup};
use crate::services::invite_code::{
    generate_invite_code, is_valid_custom_code, normalize_invite_code, MAX_CODE_LENGTH,
    MIN_CODE_LENGTH,
};
use crate::services::session_store::SessionStore;
use std::sync::Arc;

/// Attempts at finding a free system-generated invite code
const MAX_CODE_ATTEMPTS: usize = 5;

/// Longest accepted group name, in characters
const MAX_GROUP_NAME_LENGTH: usize = 80;

/// Error types for membership operations
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    /// More than one group carries the code (store without the unique constraint)
    #[error("Invite code '{0}' matches more than one group")]
    Ambiguous(String),

    /// The group exists but its creator is not a member of it
    #[error("Group '{}' was created but its creator could not be attached: {reason}", .group.name)]
    MembershipAttachFailed { group: Group, reason: String },

    #[error("Invite code '{0}' is already in use")]
    InviteCodeTaken(String),

    #[error("Only the creator of this group can do that")]
    NotGroupCreator,

    #[error("Group store unavailable: {0:#}")]
    RemoteUnavailable(#[from] anyhow::Error),
}

impl MembershipError {
    /// Message suitable for showing next to the form
    pub fn user_message(&self) -> String {
        match self {
            MembershipError::Unauthenticated => "You are not signed in".to_string(),
            MembershipError::InvalidInput(msg) | MembershipError::NotFound(msg) => msg.clone(),
            MembershipError::Ambiguous(_) => {
                "That invite code matches more than one group. Ask the group admin for a new code."
                    .to_string()
            }
            MembershipError::MembershipAttachFailed { group, .. } => format!(
                "\"{}\" was created but you could not be added to it. Please try again.",
                group.name
            ),
            MembershipError::InviteCodeTaken(code) => {
                format!("The invite code {} is already in use", code)
            }
            MembershipError::NotGroupCreator => self.to_string(),
            MembershipError::RemoteUnavailable(e) => format!("{:#}", e),
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub group: Group,
    /// True when the caller was a member before this call
    pub already_member: bool,
}

/// A group as seen by one of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDetail {
    pub group: Group,
    pub role: MemberRole,
    pub member_count: i64,
}

/// Membership service
pub struct MembershipService {
    groups: Arc<dyn GroupRepository>,
    sessions: SessionStore,
    code_length: usize,
}

impl MembershipService {
    pub fn new(groups: Arc<dyn GroupRepository>, sessions: SessionStore, invite: &InviteConfig) -> Self {
        Self {
            groups,
            sessions,
            code_length: invite.code_length,
        }
    }

    /// Create a group with a system-generated invite code.
    ///
    /// The caller becomes its admin. A generated code that turns out to be
    /// taken is replaced with a fresh one, a bounded number of times.
    pub async fn create_group(&self, name: &str) -> Result<Group, MembershipError> {
        let name = validate_group_name(name)?;
        let user_id = self.current_user_id().await?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let group = NewGroup {
                name: name.clone(),
                invite_code: generate_invite_code(self.code_length),
                created_by: user_id,
            };

            match self.groups.create_with_admin(&group).await {
                Ok(creation) => return finish_creation(creation),
                Err(e) if e.downcast_ref::<InviteCodeConflict>().is_some() => {
                    tracing::debug!(attempt, code = %group.invite_code, "Generated invite code taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(anyhow::anyhow!(
            "Could not allocate a free invite code after {} attempts",
            MAX_CODE_ATTEMPTS
        )
        .into())
    }

    /// Create a group with an invite code chosen by the creator.
    ///
    /// The code is normalized first and must then be
    /// `MIN_CODE_LENGTH..=MAX_CODE_LENGTH` ASCII letters or digits.
    pub async fn create_group_with_invite_code(
        &self,
        name: &str,
        invite_code: &str,
    ) -> Result<Group, MembershipError> {
        let name = validate_group_name(name)?;
        let code = normalize_invite_code(invite_code);
        if !is_valid_custom_code(&code) {
            return Err(MembershipError::InvalidInput(format!(
                "Invite codes must be {} to {} letters or digits",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH
            )));
        }
        let user_id = self.current_user_id().await?;

        let group = NewGroup {
            name,
            invite_code: code,
            created_by: user_id,
        };

        match self.groups.create_with_admin(&group).await {
            Ok(creation) => finish_creation(creation),
            Err(e) if e.downcast_ref::<InviteCodeConflict>().is_some() => {
                Err(MembershipError::InviteCodeTaken(group.invite_code))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Join the group behind an invite code. Codes are case-insensitive.
    ///
    /// Joining a group twice is not an error: the second call reports
    /// `already_member = true` and inserts nothing.
    pub async fn join_group(&self, invite_code: &str) -> Result<JoinOutcome, MembershipError> {
        let code = normalize_invite_code(invite_code);
        if code.is_empty() {
            return Err(MembershipError::InvalidInput(
                "Enter an invite code".to_string(),
            ));
        }
        let user_id = self.current_user_id().await?;

        let mut matches = self.groups.find_by_invite_code(&code).await?;
        let group = match matches.len() {
            0 => {
                return Err(MembershipError::NotFound(format!(
                    "No group found with invite code {}",
                    code
                )))
            }
            1 => matches.remove(0),
            _ => {
                tracing::warn!(code = %code, "Invite code matches more than one group");
                return Err(MembershipError::Ambiguous(code));
            }
        };

        if self.groups.get_membership(group.id, user_id).await?.is_some() {
            tracing::info!(group_id = group.id, user_id, "Join skipped: already a member");
            return Ok(JoinOutcome {
                group,
                already_member: true,
            });
        }

        let already_member = match self.groups.add_member(group.id, user_id, MemberRole::Member).await? {
            MemberInsert::Inserted(_) => {
                tracing::info!(group_id = group.id, user_id, "User joined group");
                false
            }
            MemberInsert::Conflict => {
                tracing::warn!(
                    group_id = group.id,
                    user_id,
                    "Concurrent join hit the membership constraint, treating as already a member"
                );
                true
            }
        };

        Ok(JoinOutcome {
            group,
            already_member,
        })
    }

    /// Attach the caller as admin of a group they created but are not in.
    ///
    /// Compensation for [`MembershipError::MembershipAttachFailed`]. Safe to
    /// call again: an existing membership is returned unchanged.
    pub async fn attach_creator(&self, group_id: i64) -> Result<Membership, MembershipError> {
        let user_id = self.current_user_id().await?;

        let group = self
            .groups
            .get_by_id(group_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound(format!("Group {} does not exist", group_id)))?;

        if group.created_by != user_id {
            return Err(MembershipError::NotGroupCreator);
        }

        match self.groups.add_member(group_id, user_id, MemberRole::Admin).await? {
            MemberInsert::Inserted(membership) => {
                tracing::info!(group_id, user_id, "Creator attached to group");
                Ok(membership)
            }
            MemberInsert::Conflict => self
                .groups
                .get_membership(group_id, user_id)
                .await?
                .ok_or_else(|| {
                    anyhow::anyhow!("Membership for group {} vanished after a conflict", group_id)
                        .into()
                }),
        }
    }

    /// One group the caller belongs to, with their role and the member count.
    ///
    /// Groups the caller is not in are reported as not found.
    pub async fn group_detail(&self, group_id: i64) -> Result<GroupDetail, MembershipError> {
        let user_id = self.current_user_id().await?;
        let not_found = || MembershipError::NotFound(format!("Group {} not found", group_id));

        let membership = self
            .groups
            .get_membership(group_id, user_id)
            .await?
            .ok_or_else(not_found)?;
        let group = self.groups.get_by_id(group_id).await?.ok_or_else(not_found)?;
        let member_count = self.groups.count_members(group_id).await?;

        Ok(GroupDetail {
            group,
            role: membership.role,
            member_count,
        })
    }

    async fn current_user_id(&self) -> Result<i64, MembershipError> {
        match self.sessions.current_session().await {
            Some(session) if !session.is_expired() => Ok(session.user_id()),
            _ => Err(MembershipError::Unauthenticated),
        }
    }
}

fn validate_group_name(name: &str) -> Result<String, MembershipError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MembershipError::InvalidInput(
            "Enter a name for the group".to_string(),
        ));
    }
    if name.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(MembershipError::InvalidInput(format!(
            "Group names can be at most {} characters",
            MAX_GROUP_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn finish_creation(creation: GroupCreation) -> Result<Group, MembershipError> {
    match creation {
        GroupCreation::Created(group) => {
            tracing::info!(
                group_id = group.id,
                created_by = group.created_by,
                code = %group.invite_code,
                "Group created"
            );
            Ok(group)
        }
        GroupCreation::PartiallyCreated { group, reason } => {
            tracing::warn!(
                group_id = group.id,
                created_by = group.created_by,
                reason = %reason,
                "Group created without its admin membership"
            );
            Err(MembershipError::MembershipAttachFailed { group, reason })
        }
    }
}
