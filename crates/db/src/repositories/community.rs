//! Community repository.
//!
//! Directory listings carry `members_count` and `posts_count` computed as
//! correlated subqueries, so counts are always consistent with the membership
//! and post tables - nothing is denormalized.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, Func, Query, SimpleExpr, SubQueryStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::Serialize;

use crate::entities::community::Visibility;
use crate::entities::{Community, Membership, Post, community, membership, post};

/// Sort key for directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommunityOrdering {
    /// Creation time (default).
    #[default]
    CreatedAt,
    /// Display name.
    Name,
    /// Number of active members.
    MembersCount,
}

/// Community row annotated with aggregate counts.
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct CommunityWithCounts {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
    /// Count of memberships with an active role (pending excluded).
    pub members_count: i64,
    /// Count of non-deleted posts.
    pub posts_count: i64,
}

/// Repository for community operations.
#[derive(Clone)]
pub struct CommunityRepository {
    db: Arc<DatabaseConnection>,
}

/// `COUNT(*)` over active memberships of the outer community row.
fn members_count_expr() -> SimpleExpr {
    let select = Query::select()
        .expr(Func::count(Expr::col((
            Membership,
            membership::Column::Id,
        ))))
        .from(Membership)
        .and_where(
            Expr::col((Membership, membership::Column::CommunityId))
                .equals((Community, community::Column::Id)),
        )
        .and_where(
            Expr::col((Membership, membership::Column::Role)).is_in([
                "owner",
                "moderator",
                "member",
            ]),
        )
        .to_owned();

    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select)))
}

/// `COUNT(*)` over non-deleted posts of the outer community row.
fn posts_count_expr() -> SimpleExpr {
    let select = Query::select()
        .expr(Func::count(Expr::col((Post, post::Column::Id))))
        .from(Post)
        .and_where(
            Expr::col((Post, post::Column::CommunityId)).equals((Community, community::Column::Id)),
        )
        .and_where(Expr::col((Post, post::Column::IsDeleted)).eq(false))
        .to_owned();

    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select)))
}

fn search_condition(query: &str) -> Condition {
    Condition::any()
        .add(community::Column::Slug.contains(query))
        .add(community::Column::Name.contains(query))
        .add(community::Column::Description.contains(query))
}

impl CommunityRepository {
    /// Create a new community repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find community by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<community::Model>> {
        Community::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find community by slug.
    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<community::Model>> {
        Community::find()
            .filter(community::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get community by slug, returning error if not found.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<community::Model> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Community not found: {slug}")))
    }

    /// Get a community with its aggregate counts.
    pub async fn get_annotated_by_slug(&self, slug: &str) -> AppResult<CommunityWithCounts> {
        Community::find()
            .filter(community::Column::Slug.eq(slug))
            .column_as(members_count_expr(), "members_count")
            .column_as(posts_count_expr(), "posts_count")
            .into_model::<CommunityWithCounts>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Community not found: {slug}")))
    }

    /// Create a community together with its first (owner) membership.
    ///
    /// Both rows are written in one transaction: a community must never
    /// exist without an owner. A duplicate slug surfaces as `Conflict`.
    pub async fn create_with_owner(
        &self,
        community: community::ActiveModel,
        owner_membership: membership::ActiveModel,
    ) -> AppResult<community::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = community.insert(&txn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("Slug already taken".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

        owner_membership
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Update a community.
    pub async fn update(&self, model: community::ActiveModel) -> AppResult<community::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a community permanently (cascades to posts and memberships).
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Community::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// List communities with aggregate counts, optionally filtered by a
    /// search term and/or restricted to a set of community IDs.
    pub async fn list_annotated(
        &self,
        search: Option<&str>,
        within_ids: Option<&[String]>,
        ordering: CommunityOrdering,
        order: Order,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<CommunityWithCounts>, u64)> {
        let mut query = Community::find();

        if let Some(term) = search {
            query = query.filter(search_condition(term));
        }
        if let Some(ids) = within_ids {
            if ids.is_empty() {
                return Ok((vec![], 0));
            }
            query = query.filter(community::Column::Id.is_in(ids.iter().cloned()));
        }

        let total = query
            .clone()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut query = query
            .column_as(members_count_expr(), "members_count")
            .column_as(posts_count_expr(), "posts_count");

        query = match ordering {
            CommunityOrdering::CreatedAt => query
                .order_by(community::Column::CreatedAt, order.clone())
                .order_by(community::Column::Id, order),
            CommunityOrdering::Name => query.order_by(community::Column::Name, order),
            CommunityOrdering::MembersCount => query
                .order_by(members_count_expr(), order)
                .order_by(community::Column::Id, Order::Desc),
        };

        let rows = query
            .offset(offset)
            .limit(limit)
            .into_model::<CommunityWithCounts>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((rows, total))
    }
}
