//! Membership repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr, TransactionTrait,
};
use std::collections::HashMap;

use crate::entities::membership::MembershipRole;
use crate::entities::{Membership, membership};

/// Active roles - everything except pending join requests.
pub const ACTIVE_ROLES: [MembershipRole; 3] = [
    MembershipRole::Owner,
    MembershipRole::Moderator,
    MembershipRole::Member,
];

/// Repository for membership operations.
#[derive(Clone)]
pub struct MembershipRepository {
    db: Arc<DatabaseConnection>,
}

/// Owner rows of a community, locked `FOR UPDATE`.
///
/// Run inside a transaction; the lock serializes concurrent owner
/// deletions so the last-owner check cannot race.
fn owner_rows_query(community_id: &str) -> Select<Membership> {
    Membership::find()
        .filter(membership::Column::CommunityId.eq(community_id))
        .filter(membership::Column::Role.eq(MembershipRole::Owner))
        .lock_exclusive()
}

impl MembershipRepository {
    /// Create a new membership repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find membership by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<membership::Model>> {
        Membership::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get membership by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<membership::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Membership not found: {id}")))
    }

    /// Find the membership row for a `(community, user)` pair.
    pub async fn find_by_community_and_user(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> AppResult<Option<membership::Model>> {
        Membership::find()
            .filter(membership::Column::CommunityId.eq(community_id))
            .filter(membership::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user's role in a community, if any.
    pub async fn role_of(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> AppResult<Option<MembershipRole>> {
        let membership = self.find_by_community_and_user(community_id, user_id).await?;
        Ok(membership.map(|m| m.role))
    }

    /// Insert a membership row.
    ///
    /// The unique index on `(community_id, user_id)` makes concurrent joins
    /// safe: exactly one insert wins, the loser gets a `Conflict`.
    pub async fn create(&self, model: membership::ActiveModel) -> AppResult<membership::Model> {
        match model.insert(self.db.as_ref()).await {
            Ok(m) => Ok(m),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(AppError::Conflict(
                    "Already a member of this community".to_string(),
                )),
                _ => Err(AppError::Database(e.to_string())),
            },
        }
    }

    /// Change the role of a membership.
    pub async fn update_role(
        &self,
        membership: membership::Model,
        role: MembershipRole,
    ) -> AppResult<membership::Model> {
        let mut active: membership::ActiveModel = membership.into();
        active.role = Set(role);
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a membership row.
    pub async fn delete(&self, membership: membership::Model) -> AppResult<()> {
        membership
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete a membership, refusing to remove a community's last owner.
    ///
    /// Guard and delete run in one transaction with the owner rows locked,
    /// so two concurrent owner departures cannot both see a surviving
    /// co-owner and leave the community ownerless.
    pub async fn delete_guarding_owners(&self, membership: membership::Model) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if membership.role.is_owner() {
            let owners = owner_rows_query(&membership.community_id)
                .all(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if owners.len() <= 1 {
                return Err(AppError::LastOwnerProtected);
            }
        }

        membership
            .delete(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List memberships of a community with a given set of roles.
    pub async fn list_for_community(
        &self,
        community_id: &str,
        roles: &[MembershipRole],
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<membership::Model>, u64)> {
        let query = Membership::find()
            .filter(membership::Column::CommunityId.eq(community_id))
            .filter(membership::Column::Role.is_in(roles.iter().copied()));

        let total = query
            .clone()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let rows = query
            .order_by(membership::Column::CreatedAt, Order::Asc)
            .order_by(membership::Column::Id, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((rows, total))
    }

    /// Map of `community_id -> membership` for one user over a set of
    /// communities. Used to attach the viewer's role to directory listings
    /// in a single query.
    pub async fn map_for_user(
        &self,
        user_id: &str,
        community_ids: &[String],
    ) -> AppResult<HashMap<String, membership::Model>> {
        if community_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Membership::find()
            .filter(membership::Column::UserId.eq(user_id))
            .filter(membership::Column::CommunityId.is_in(community_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|m| (m.community_id.clone(), m)).collect())
    }

    /// IDs of communities where the user holds one of the given roles.
    pub async fn community_ids_with_roles(
        &self,
        user_id: &str,
        roles: &[MembershipRole],
    ) -> AppResult<Vec<String>> {
        let rows = Membership::find()
            .filter(membership::Column::UserId.eq(user_id))
            .filter(membership::Column::Role.is_in(roles.iter().copied()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|m| m.community_id).collect())
    }
}
