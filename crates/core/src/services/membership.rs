//! Membership service.
//!
//! The membership ledger decides who may do what inside a community. Every
//! role change funnels through here so the one structural invariant holds:
//! a community never loses its last owner.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::entities::community::Visibility;
use agora_db::entities::membership::MembershipRole;
use agora_db::entities::{community, membership};
use agora_db::repositories::{ACTIVE_ROLES, MembershipRepository, PostRepository};
use chrono::Utc;
use sea_orm::Set;
use serde::Serialize;

/// Outcome of a join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Joined a public community as a member.
    Joined(membership::Model),
    /// Filed a join request on a restricted community.
    Requested(membership::Model),
    /// A join request is already waiting for approval.
    AlreadyPending,
    /// Already holds an active role.
    AlreadyMember,
}

/// Membership row as exposed in member listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub community_id: String,
    pub user_id: String,
    pub role: MembershipRole,
    /// Non-deleted posts this member wrote in the community.
    pub posts_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Service for managing community memberships.
#[derive(Clone)]
pub struct MembershipService {
    membership_repo: MembershipRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl MembershipService {
    /// Create a new membership service.
    #[must_use]
    pub const fn new(membership_repo: MembershipRepository, post_repo: PostRepository) -> Self {
        Self {
            membership_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a user's role in a community, if any.
    pub async fn role_of(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> AppResult<Option<MembershipRole>> {
        self.membership_repo.role_of(community_id, user_id).await
    }

    /// Require the user to hold an active role; returns it.
    pub async fn require_active_member(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> AppResult<MembershipRole> {
        match self.role_of(community_id, user_id).await? {
            Some(role) if role.is_active() => Ok(role),
            _ => Err(AppError::Forbidden(
                "You must be a member of this community".to_string(),
            )),
        }
    }

    /// Require moderator or owner.
    pub async fn require_moderator(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> AppResult<MembershipRole> {
        match self.role_of(community_id, user_id).await? {
            Some(role) if role.can_moderate() => Ok(role),
            _ => Err(AppError::Forbidden(
                "Moderator privileges required".to_string(),
            )),
        }
    }

    /// Require owner.
    pub async fn require_owner(&self, community_id: &str, user_id: &str) -> AppResult<()> {
        match self.role_of(community_id, user_id).await? {
            Some(role) if role.is_owner() => Ok(()),
            _ => Err(AppError::Forbidden("Owner privileges required".to_string())),
        }
    }

    /// Join a community.
    ///
    /// Public communities grant the member role immediately; restricted ones
    /// record a pending request that a moderator must approve. Both paths are
    /// idempotent against repeat calls from the same user.
    pub async fn join(&self, community: &community::Model, user_id: &str) -> AppResult<JoinOutcome> {
        if let Some(existing) = self
            .membership_repo
            .find_by_community_and_user(&community.id, user_id)
            .await?
        {
            return Ok(if existing.role == MembershipRole::Pending {
                JoinOutcome::AlreadyPending
            } else {
                JoinOutcome::AlreadyMember
            });
        }

        let role = match community.visibility {
            Visibility::Public => MembershipRole::Member,
            Visibility::Restricted => MembershipRole::Pending,
        };

        let model = membership::ActiveModel {
            id: Set(self.id_gen.generate()),
            community_id: Set(community.id.clone()),
            user_id: Set(user_id.to_string()),
            role: Set(role),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let created = self.membership_repo.create(model).await?;

        tracing::info!(
            community_id = %community.id,
            user_id = %user_id,
            role = ?role,
            "membership created"
        );

        Ok(match role {
            MembershipRole::Pending => JoinOutcome::Requested(created),
            _ => JoinOutcome::Joined(created),
        })
    }

    /// Leave a community. Leaving as the last owner is rejected.
    pub async fn leave(&self, community_id: &str, user_id: &str) -> AppResult<()> {
        let membership = self
            .membership_repo
            .find_by_community_and_user(community_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Not a member of this community".to_string()))?;

        self.membership_repo.delete_guarding_owners(membership).await
    }

    /// Promote a member or moderator to moderator.
    ///
    /// Owners cannot be promoted and pending requests must go through
    /// approve; both are invalid transitions.
    pub async fn promote(
        &self,
        community_id: &str,
        membership_id: &str,
    ) -> AppResult<membership::Model> {
        let membership = self.get_in_community(community_id, membership_id).await?;

        match membership.role {
            MembershipRole::Member | MembershipRole::Moderator => {
                self.membership_repo
                    .update_role(membership, MembershipRole::Moderator)
                    .await
            }
            MembershipRole::Owner => Err(AppError::Conflict(
                "Cannot promote an owner".to_string(),
            )),
            MembershipRole::Pending => Err(AppError::Conflict(
                "Pending requests must be approved, not promoted".to_string(),
            )),
        }
    }

    /// Demote a moderator back to member.
    pub async fn demote(
        &self,
        community_id: &str,
        membership_id: &str,
    ) -> AppResult<membership::Model> {
        let membership = self.get_in_community(community_id, membership_id).await?;

        if membership.role != MembershipRole::Moderator {
            return Err(AppError::Conflict(
                "Only moderators can be demoted".to_string(),
            ));
        }

        self.membership_repo
            .update_role(membership, MembershipRole::Member)
            .await
    }

    /// Approve a pending join request.
    pub async fn approve(
        &self,
        community_id: &str,
        membership_id: &str,
    ) -> AppResult<membership::Model> {
        let membership = self.get_in_community(community_id, membership_id).await?;

        if membership.role != MembershipRole::Pending {
            return Err(AppError::NotFound(
                "No pending request with this id".to_string(),
            ));
        }

        self.membership_repo
            .update_role(membership, MembershipRole::Member)
            .await
    }

    /// Decline a pending join request, deleting the row.
    pub async fn decline(&self, community_id: &str, membership_id: &str) -> AppResult<()> {
        let membership = self.get_in_community(community_id, membership_id).await?;

        if membership.role != MembershipRole::Pending {
            return Err(AppError::NotFound(
                "No pending request with this id".to_string(),
            ));
        }

        self.membership_repo.delete(membership).await
    }

    /// Remove a member from a community. Removing the last owner is rejected.
    pub async fn remove(&self, community_id: &str, membership_id: &str) -> AppResult<()> {
        let membership = self.get_in_community(community_id, membership_id).await?;
        self.membership_repo.delete_guarding_owners(membership).await
    }

    /// Fetch a membership, treating rows of other communities as absent.
    async fn get_in_community(
        &self,
        community_id: &str,
        membership_id: &str,
    ) -> AppResult<membership::Model> {
        let membership = self.membership_repo.get_by_id(membership_id).await?;
        if membership.community_id != community_id {
            return Err(AppError::NotFound(format!(
                "Membership not found: {membership_id}"
            )));
        }
        Ok(membership)
    }

    /// List active members of a community, annotated with post counts.
    pub async fn list_members(
        &self,
        community_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<MemberResponse>, u64)> {
        self.list_with_roles(community_id, &ACTIVE_ROLES, limit, offset)
            .await
    }

    /// List pending join requests of a community.
    pub async fn list_pending(
        &self,
        community_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<MemberResponse>, u64)> {
        self.list_with_roles(community_id, &[MembershipRole::Pending], limit, offset)
            .await
    }

    async fn list_with_roles(
        &self,
        community_id: &str,
        roles: &[MembershipRole],
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<MemberResponse>, u64)> {
        let (rows, total) = self
            .membership_repo
            .list_for_community(community_id, roles, limit, offset)
            .await?;

        let author_ids: Vec<String> = rows.iter().map(|m| m.user_id.clone()).collect();
        let post_counts = self
            .post_repo
            .count_by_authors(community_id, &author_ids)
            .await?;

        let members = rows
            .into_iter()
            .map(|m| MemberResponse {
                posts_count: post_counts.get(&m.user_id).copied().unwrap_or(0),
                id: m.id,
                community_id: m.community_id,
                user_id: m.user_id,
                role: m.role,
                created_at: m.created_at.into(),
            })
            .collect();

        Ok((members, total))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: Arc<sea_orm::DatabaseConnection>) -> MembershipService {
        MembershipService::new(
            MembershipRepository::new(db.clone()),
            PostRepository::new(db),
        )
    }

    fn test_membership(role: MembershipRole) -> membership::Model {
        membership::Model {
            id: "m1".to_string(),
            community_id: "c1".to_string(),
            user_id: "u1".to_string(),
            role,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_community(visibility: Visibility) -> community::Model {
        community::Model {
            id: "c1".to_string(),
            slug: "rustaceans".to_string(),
            name: "Rustaceans".to_string(),
            description: String::new(),
            visibility,
            icon_url: None,
            banner_url: None,
            created_by: "u0".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_join_public_becomes_member() {
        let created = test_membership(MembershipRole::Member);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<membership::Model>::new()])
                .append_query_results([[created]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let outcome = service(db)
            .join(&test_community(Visibility::Public), "u1")
            .await
            .unwrap();

        assert!(matches!(outcome, JoinOutcome::Joined(m) if m.role == MembershipRole::Member));
    }

    #[tokio::test]
    async fn test_join_twice_reports_already_member() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_membership(MembershipRole::Member)]])
                .into_connection(),
        );

        let outcome = service(db)
            .join(&test_community(Visibility::Public), "u1")
            .await
            .unwrap();

        assert_eq!(outcome, JoinOutcome::AlreadyMember);
    }

    #[tokio::test]
    async fn test_join_restricted_is_pending() {
        let created = test_membership(MembershipRole::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<membership::Model>::new()])
                .append_query_results([[created]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let outcome = service(db)
            .join(&test_community(Visibility::Restricted), "u1")
            .await
            .unwrap();

        assert!(matches!(outcome, JoinOutcome::Requested(_)));
    }

    #[tokio::test]
    async fn test_promote_owner_rejected() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_membership(MembershipRole::Owner)]])
                .into_connection(),
        );

        let result = service(db).promote("c1", "m1").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_demote_member_rejected() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_membership(MembershipRole::Member)]])
                .into_connection(),
        );

        let result = service(db).demote("c1", "m1").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_approve_requires_pending() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_membership(MembershipRole::Member)]])
                .into_connection(),
        );

        let result = service(db).approve("c1", "m1").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_last_owner_protected() {
        // Owner-row lookup inside the delete transaction finds a single row.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_membership(MembershipRole::Owner)]])
                .append_query_results([[test_membership(MembershipRole::Owner)]])
                .into_connection(),
        );

        let result = service(db).remove("c1", "m1").await;
        assert!(matches!(result, Err(AppError::LastOwnerProtected)));
    }

    #[tokio::test]
    async fn test_leave_as_one_of_two_owners_succeeds() {
        let co_owner = membership::Model {
            id: "m2".to_string(),
            user_id: "u2".to_string(),
            ..test_membership(MembershipRole::Owner)
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_membership(MembershipRole::Owner)]])
                .append_query_results([[test_membership(MembershipRole::Owner), co_owner]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let result = service(db).leave("c1", "u1").await;
        assert!(result.is_ok());
    }
}
