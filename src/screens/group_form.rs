//! Create-group and join-group forms
//!
//! One text input, a pending flag and a message line. While a submit is in
//! flight the same action cannot be submitted again. A failed submit keeps
//! the input so the user can correct it; a successful one clears it.

use crate::models::Group;
use crate::services::action_gate::ActionGate;
use crate::services::membership::{MembershipError, MembershipService};
use std::sync::Arc;
use tokio::sync::watch;

/// Which action a form submits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormAction {
    CreateGroup,
    JoinGroup,
}

impl FormAction {
    /// Key under which the action is gated
    pub fn key(self) -> &'static str {
        match self {
            FormAction::CreateGroup => "group.create",
            FormAction::JoinGroup => "group.join",
        }
    }
}

/// Line shown under the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMessage {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub input: String,
    pub pending: bool,
    pub message: Option<FormMessage>,
}

/// What a successful submit did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Created(Group),
    Joined { group: Group, already_member: bool },
}

impl FormOutcome {
    pub fn group(&self) -> &Group {
        match self {
            FormOutcome::Created(group) | FormOutcome::Joined { group, .. } => group,
        }
    }

    fn message(&self) -> String {
        match self {
            FormOutcome::Created(group) => format!(
                "\"{}\" created. Share the invite code {} with your players.",
                group.name, group.invite_code
            ),
            FormOutcome::Joined {
                group,
                already_member: false,
            } => format!("You joined \"{}\"", group.name),
            FormOutcome::Joined {
                group,
                already_member: true,
            } => format!("You are already a member of \"{}\"", group.name),
        }
    }
}

/// Form model for creating or joining a group
pub struct GroupActionForm {
    membership: Arc<MembershipService>,
    gate: ActionGate,
    state: watch::Sender<FormState>,
}

impl GroupActionForm {
    pub fn new(membership: Arc<MembershipService>, gate: ActionGate) -> Self {
        let (state, _) = watch::channel(FormState::default());
        Self {
            membership,
            gate,
            state,
        }
    }

    pub fn state(&self) -> FormState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FormState> {
        self.state.subscribe()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|state| state.input = text);
    }

    /// Create a group named after the current input.
    ///
    /// `Ok(None)` means a create was already in flight and nothing happened.
    pub async fn submit_create(&self) -> Result<Option<FormOutcome>, MembershipError> {
        self.submit(FormAction::CreateGroup).await
    }

    /// Join the group whose invite code is the current input.
    ///
    /// `Ok(None)` means a join was already in flight and nothing happened.
    pub async fn submit_join(&self) -> Result<Option<FormOutcome>, MembershipError> {
        self.submit(FormAction::JoinGroup).await
    }

    async fn submit(&self, action: FormAction) -> Result<Option<FormOutcome>, MembershipError> {
        let Some(_ticket) = self.gate.try_begin(action.key()) else {
            return Ok(None);
        };

        let input = self.state.borrow().input.clone();
        self.state.send_modify(|state| {
            state.pending = true;
            state.message = None;
        });

        let result = match action {
            FormAction::CreateGroup => self
                .membership
                .create_group(&input)
                .await
                .map(FormOutcome::Created),
            FormAction::JoinGroup => self
                .membership
                .join_group(&input)
                .await
                .map(|outcome| FormOutcome::Joined {
                    group: outcome.group,
                    already_member: outcome.already_member,
                }),
        };

        self.state.send_modify(|state| {
            state.pending = false;
            state.message = Some(match &result {
                Ok(outcome) => {
                    // Text typed while the submit was pending stays
                    if state.input == input {
                        state.input.clear();
                    }
                    FormMessage::Info(outcome.message())
                }
                Err(e) => FormMessage::Error(e.user_message()),
            });
        });

        result.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InviteConfig;
    use crate::db::repositories::{GroupCreation, GroupRepository, MemberInsert, SqlxGroupRepository};
    use crate::db::DynDatabasePool;
    use crate::models::{GroupListItem, MemberRole, Membership, NewGroup};
    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use crate::services::membership::test_support::{create_user, migrated_pool};
    use crate::services::session_store::test_support::signed_in_store;

    async fn form_for(pool: &DynDatabasePool, name: &str, gate: ActionGate) -> GroupActionForm {
        let user_id = create_user(pool, name).await;
        let membership = MembershipService::new(
            SqlxGroupRepository::boxed(pool.clone()),
            signed_in_store(user_id, name),
            &InviteConfig::default(),
        );
        GroupActionForm::new(Arc::new(membership), gate)
    }

    #[tokio::test]
    async fn test_create_success_reports_invite_code_and_clears_input() {
        let pool = migrated_pool().await;
        let form = form_for(&pool, "ana", ActionGate::new()).await;
        form.set_input("Friday League");

        let outcome = form.submit_create().await.unwrap().expect("not gated");
        let group = outcome.group().clone();

        let state = form.state();
        assert!(!state.pending);
        assert_eq!(state.input, "");
        match state.message {
            Some(FormMessage::Info(msg)) => assert!(msg.contains(&group.invite_code)),
            other => panic!("expected info message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_input_and_shows_error() {
        let pool = migrated_pool().await;
        let form = form_for(&pool, "ana", ActionGate::new()).await;
        form.set_input("nope99");

        let result = form.submit_join().await;
        assert!(matches!(result, Err(MembershipError::NotFound(_))));

        let state = form.state();
        assert!(!state.pending);
        assert_eq!(state.input, "nope99");
        assert!(matches!(state.message, Some(FormMessage::Error(ref m)) if m.contains("NOPE99")));
    }

    #[tokio::test]
    async fn test_join_reports_membership() {
        let pool = migrated_pool().await;
        let owner = form_for(&pool, "ana", ActionGate::new()).await;
        owner.set_input("Sunday 5");
        let group = owner.submit_create().await.unwrap().unwrap().group().clone();

        let player = form_for(&pool, "bea", ActionGate::new()).await;
        player.set_input(group.invite_code.to_lowercase());
        let joined = player.submit_join().await.unwrap().unwrap();
        assert!(matches!(
            joined,
            FormOutcome::Joined { ref group, already_member: false } if group.name == "Sunday 5"
        ));
        assert_eq!(joined.group().id, group.id);

        player.set_input(group.invite_code.clone());
        let again = player.submit_join().await.unwrap().unwrap();
        assert!(matches!(again, FormOutcome::Joined { already_member: true, .. }));
        assert!(matches!(
            player.state().message,
            Some(FormMessage::Info(ref m)) if m.contains("already a member")
        ));
    }

    #[tokio::test]
    async fn test_submit_is_ignored_while_in_flight() {
        let pool = migrated_pool().await;
        let gate = ActionGate::new();
        let form = form_for(&pool, "ana", gate.clone()).await;
        form.set_input("Friday League");

        let ticket = gate.try_begin(FormAction::CreateGroup.key()).unwrap();
        assert_eq!(form.submit_create().await.unwrap(), None);
        assert_eq!(form.state().input, "Friday League");
        assert_eq!(SqlxGroupRepository::new(pool.clone()).count().await.unwrap(), 0);

        // Other actions are not blocked
        form.set_input("NOPE99");
        assert!(form.submit_join().await.is_err());

        drop(ticket);
        form.set_input("Friday League");
        assert!(form.submit_create().await.unwrap().is_some());
        assert!(!gate.is_busy(FormAction::CreateGroup.key()));
    }

    /// SQL group store whose creates wait for a permit
    struct HeldCreates {
        inner: SqlxGroupRepository,
        permits: Semaphore,
    }

    #[async_trait]
    impl GroupRepository for HeldCreates {
        async fn create_with_admin(&self, group: &NewGroup) -> anyhow::Result<GroupCreation> {
            self.permits.acquire().await?.forget();
            self.inner.create_with_admin(group).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Group>> {
            self.inner.get_by_id(id).await
        }
        async fn find_by_invite_code(&self, code: &str) -> anyhow::Result<Vec<Group>> {
            self.inner.find_by_invite_code(code).await
        }
        async fn get_membership(&self, group_id: i64, user_id: i64) -> anyhow::Result<Option<Membership>> {
            self.inner.get_membership(group_id, user_id).await
        }
        async fn add_member(&self, group_id: i64, user_id: i64, role: MemberRole) -> anyhow::Result<MemberInsert> {
            self.inner.add_member(group_id, user_id, role).await
        }
        async fn list_for_user(&self, user_id: i64) -> anyhow::Result<Vec<GroupListItem>> {
            self.inner.list_for_user(user_id).await
        }
        async fn count_members(&self, group_id: i64) -> anyhow::Result<i64> {
            self.inner.count_members(group_id).await
        }
        async fn count(&self) -> anyhow::Result<i64> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_success_keeps_text_typed_while_pending() {
        let pool = migrated_pool().await;
        let user_id = create_user(&pool, "ana").await;
        let repo = Arc::new(HeldCreates {
            inner: SqlxGroupRepository::new(pool.clone()),
            permits: Semaphore::new(0),
        });
        let membership = MembershipService::new(
            repo.clone(),
            signed_in_store(user_id, "ana"),
            &InviteConfig::default(),
        );
        let form = GroupActionForm::new(Arc::new(membership), ActionGate::new());
        form.set_input("Friday League");
        let mut updates = form.subscribe();

        let edit_while_pending = async {
            updates.wait_for(|state| state.pending).await.unwrap();
            form.set_input("Sunday 5");
            repo.permits.add_permits(1);
        };
        let (outcome, ()) = tokio::join!(form.submit_create(), edit_while_pending);

        assert_eq!(outcome.unwrap().unwrap().group().name, "Friday League");
        let state = form.state();
        assert!(!state.pending);
        assert_eq!(state.input, "Sunday 5");
        assert!(matches!(state.message, Some(FormMessage::Info(_))));
    }

    #[tokio::test]
    async fn test_completion_is_published() {
        let pool = migrated_pool().await;
        let form = form_for(&pool, "ana", ActionGate::new()).await;
        form.set_input("Friday League");
        let mut updates = form.subscribe();
        updates.borrow_and_update();

        form.submit_create().await.unwrap();

        // Both the pending and the completed state were published
        assert!(updates.has_changed().unwrap());
        assert!(!updates.borrow_and_update().pending);
    }
}
