//! "My groups" projection
//!
//! Every call reads the store afresh; nothing is cached between calls.

use crate::db::repositories::GroupRepository;
use crate::models::GroupListItem;
use crate::services::membership::MembershipError;
use crate::services::session_store::SessionStore;
use std::sync::Arc;

/// Lists the groups of the signed-in user
#[derive(Clone)]
pub struct GroupListingProjector {
    groups: Arc<dyn GroupRepository>,
    sessions: SessionStore,
}

impl GroupListingProjector {
    pub fn new(groups: Arc<dyn GroupRepository>, sessions: SessionStore) -> Self {
        Self { groups, sessions }
    }

    /// One row per membership, oldest membership first
    pub async fn list_my_groups(&self) -> Result<Vec<GroupListItem>, MembershipError> {
        let session = match self.sessions.current_session().await {
            Some(session) if !session.is_expired() => session,
            _ => return Err(MembershipError::Unauthenticated),
        };

        let items = self.groups.list_for_user(session.user_id()).await?;
        tracing::debug!(user_id = session.user_id(), count = items.len(), "Listed groups");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InviteConfig;
    use crate::db::repositories::SqlxGroupRepository;
    use crate::models::MemberRole;
    use crate::services::membership::test_support::{create_user, migrated_pool};
    use crate::services::membership::MembershipService;
    use crate::services::session_store::test_support::signed_in_store;

    #[tokio::test]
    async fn test_created_group_is_listed_as_admin() {
        let pool = migrated_pool().await;
        let user_id = create_user(&pool, "ana").await;
        let sessions = signed_in_store(user_id, "ana");
        let repo = SqlxGroupRepository::boxed(pool.clone());

        let membership = MembershipService::new(repo.clone(), sessions.clone(), &InviteConfig::default());
        let listing = GroupListingProjector::new(repo, sessions);

        let group = membership.create_group("Friday League").await.unwrap();
        let items = listing.list_my_groups().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, group.id);
        assert_eq!(items[0].name, "Friday League");
        assert_eq!(items[0].role, MemberRole::Admin);
        assert_eq!(items[0].invite_code, group.invite_code);
    }

    #[tokio::test]
    async fn test_listing_is_per_user_and_ordered_by_membership() {
        let pool = migrated_pool().await;
        let ana = create_user(&pool, "ana").await;
        let bea = create_user(&pool, "bea").await;
        let repo = SqlxGroupRepository::boxed(pool.clone());

        let ana_groups = MembershipService::new(repo.clone(), signed_in_store(ana, "ana"), &InviteConfig::default());
        let bea_sessions = signed_in_store(bea, "bea");
        let bea_groups = MembershipService::new(repo.clone(), bea_sessions.clone(), &InviteConfig::default());

        let first = bea_groups.create_group("Tuesday Hoops").await.unwrap();
        let second = ana_groups.create_group("Sunday 5").await.unwrap();
        bea_groups.join_group(&second.invite_code).await.unwrap();

        let items = GroupListingProjector::new(repo.clone(), bea_sessions)
            .list_my_groups()
            .await
            .unwrap();
        let summary: Vec<_> = items.iter().map(|i| (i.id, i.role)).collect();
        assert_eq!(summary, vec![(first.id, MemberRole::Admin), (second.id, MemberRole::Member)]);

        let ana_items = GroupListingProjector::new(repo, signed_in_store(ana, "ana"))
            .list_my_groups()
            .await
            .unwrap();
        assert_eq!(ana_items.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_requires_session() {
        let pool = migrated_pool().await;
        let sessions = SessionStore::new();
        sessions.publish(None);

        let result = GroupListingProjector::new(SqlxGroupRepository::boxed(pool), sessions)
            .list_my_groups()
            .await;
        assert!(matches!(result, Err(MembershipError::Unauthenticated)));
    }
}
