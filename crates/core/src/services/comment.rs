//! Comment service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::entities::comment;
use agora_db::repositories::{CommentFilter, CommentRepository, PostRepository};
use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::membership::MembershipService;

/// Input for creating a comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    #[validate(length(min = 1, max = 8192))]
    pub body: String,
    /// Parent comment for replies; must belong to the same post.
    pub parent_id: Option<String>,
}

/// Input for editing a comment body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentInput {
    #[validate(length(min = 1, max = 8192))]
    pub body: String,
}

/// Comment as exposed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub parent_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<comment::Model> for CommentResponse {
    fn from(model: comment::Model) -> Self {
        Self {
            id: model.id,
            post_id: model.post_id,
            author_id: model.author_id,
            body: model.body,
            parent_id: model.parent_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.map(Into::into),
        }
    }
}

/// Service for managing comments.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    membership_service: MembershipService,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        membership_service: MembershipService,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            membership_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comment on a post. Active membership in the post's community
    /// required; locked posts accept no new comments.
    pub async fn create(
        &self,
        post_id: &str,
        author_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::NotFound(format!("Post not found: {post_id}")));
        }
        if post.is_locked {
            return Err(AppError::Forbidden("This post is locked".to_string()));
        }

        self.membership_service
            .require_active_member(&post.community_id, author_id)
            .await?;

        if let Some(parent_id) = &input.parent_id {
            let parent = self.comment_repo.get_by_id(parent_id).await?;
            if parent.post_id != post.id {
                return Err(AppError::Validation(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id),
            author_id: Set(author_id.to_string()),
            body: Set(input.body),
            parent_id: Set(input.parent_id),
            is_deleted: Set(false),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.comment_repo.create(model).await
    }

    /// Edit a comment body. Author or moderator.
    pub async fn update(
        &self,
        comment_id: &str,
        user_id: &str,
        input: UpdateCommentInput,
    ) -> AppResult<comment::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let comment = self.visible_comment(comment_id).await?;
        self.require_author_or_moderator(&comment, user_id).await?;

        self.comment_repo.update_body(comment, input.body).await
    }

    /// Soft-delete a comment. Author or moderator. Replies stay.
    pub async fn delete(&self, comment_id: &str, user_id: &str) -> AppResult<()> {
        let comment = self.visible_comment(comment_id).await?;
        self.require_author_or_moderator(&comment, user_id).await?;

        self.comment_repo.set_deleted(comment).await?;
        Ok(())
    }

    /// List comments under a post, oldest first.
    pub async fn list(
        &self,
        post_id: &str,
        filter: &CommentFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<CommentResponse>, u64)> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::NotFound(format!("Post not found: {post_id}")));
        }

        let (rows, total) = self
            .comment_repo
            .list_for_post(&post.id, filter, limit, offset)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn visible_comment(&self, comment_id: &str) -> AppResult<comment::Model> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.is_deleted {
            return Err(AppError::NotFound(format!(
                "Comment not found: {comment_id}"
            )));
        }
        Ok(comment)
    }

    async fn require_author_or_moderator(
        &self,
        comment: &comment::Model,
        user_id: &str,
    ) -> AppResult<()> {
        if comment.author_id == user_id {
            return Ok(());
        }

        let post = self.post_repo.get_by_id(&comment.post_id).await?;
        let role = self
            .membership_service
            .role_of(&post.community_id, user_id)
            .await?;
        if role.is_some_and(|r| r.can_moderate()) {
            return Ok(());
        }

        Err(AppError::Forbidden(
            "Only the author or a moderator can do this".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_db::entities::membership::{self, MembershipRole};
    use agora_db::entities::post;
    use agora_db::repositories::MembershipRepository;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: Arc<sea_orm::DatabaseConnection>) -> CommentService {
        CommentService::new(
            CommentRepository::new(db.clone()),
            PostRepository::new(db.clone()),
            MembershipService::new(
                MembershipRepository::new(db.clone()),
                PostRepository::new(db),
            ),
        )
    }

    fn test_post(locked: bool) -> post::Model {
        post::Model {
            id: "p1".to_string(),
            community_id: "c1".to_string(),
            author_id: "u1".to_string(),
            title: "Hello".to_string(),
            body: String::new(),
            image_url: None,
            is_pinned: false,
            is_locked: locked,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_membership(role: MembershipRole) -> membership::Model {
        membership::Model {
            id: "m1".to_string(),
            community_id: "c1".to_string(),
            user_id: "u2".to_string(),
            role,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_comment(id: &str, post_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            post_id: post_id.to_string(),
            author_id: "u1".to_string(),
            body: "Nice".to_string(),
            parent_id: None,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_on_locked_post_forbidden() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post(true)]])
                .into_connection(),
        );

        let input = CreateCommentInput {
            body: "hi".to_string(),
            parent_id: None,
        };
        let result = service(db).create("p1", "u2", input).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_cross_post_parent() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post(false)]])
                .append_query_results([[test_membership(MembershipRole::Member)]])
                .append_query_results([[test_comment("k9", "other-post")]])
                .into_connection(),
        );

        let input = CreateCommentInput {
            body: "hi".to_string(),
            parent_id: Some("k9".to_string()),
        };
        let result = service(db).create("p1", "u2", input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_reply_same_post() {
        let created = comment::Model {
            parent_id: Some("k1".to_string()),
            author_id: "u2".to_string(),
            ..test_comment("k2", "p1")
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post(false)]])
                .append_query_results([[test_membership(MembershipRole::Member)]])
                .append_query_results([[test_comment("k1", "p1")]])
                .append_query_results([[created]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let input = CreateCommentInput {
            body: "hi".to_string(),
            parent_id: Some("k1".to_string()),
        };
        let result = service(db).create("p1", "u2", input).await.unwrap();

        assert_eq!(result.parent_id.as_deref(), Some("k1"));
    }

    #[tokio::test]
    async fn test_delete_by_moderator() {
        let mut deleted = test_comment("k1", "p1");
        deleted.is_deleted = true;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_comment("k1", "p1")]])
                .append_query_results([[test_post(false)]])
                .append_query_results([[test_membership(MembershipRole::Moderator)]])
                .append_query_results([[deleted]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let result = service(db).delete("k1", "u2").await;
        assert!(result.is_ok());
    }
}
