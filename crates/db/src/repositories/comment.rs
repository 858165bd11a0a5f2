//! Comment repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{Comment, comment};

/// Filter for comment listings under one post.
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    /// When set, only direct replies to this comment. `Some(None)` means
    /// top-level comments only; `None` means the whole thread flat.
    pub parent_id: Option<Option<String>>,
}

/// Repository for comment operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find comment by ID (including soft-deleted rows).
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get comment by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {id}")))
    }

    /// Insert a comment row.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a comment body.
    pub async fn update_body(&self, comment: comment::Model, body: String) -> AppResult<comment::Model> {
        let mut active: comment::ActiveModel = comment.into();
        active.body = Set(body);
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Soft-delete a comment. The row stays so replies keep their anchor.
    pub async fn set_deleted(&self, comment: comment::Model) -> AppResult<comment::Model> {
        let mut active: comment::ActiveModel = comment.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List non-deleted comments of a post, oldest first.
    pub async fn list_for_post(
        &self,
        post_id: &str,
        filter: &CommentFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<comment::Model>, u64)> {
        let mut query = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::IsDeleted.eq(false));

        match &filter.parent_id {
            Some(Some(parent_id)) => {
                query = query.filter(comment::Column::ParentId.eq(parent_id));
            }
            Some(None) => {
                query = query.filter(comment::Column::ParentId.is_null());
            }
            None => {}
        }

        let total = query
            .clone()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let rows = query
            .order_by(comment::Column::CreatedAt, Order::Asc)
            .order_by(comment::Column::Id, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((rows, total))
    }
}
