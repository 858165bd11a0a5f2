//! Vote service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::repositories::{PostRepository, PostVoteRepository};
use serde::{Deserialize, Serialize};

/// Input for casting a vote.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteInput {
    /// -1 (down), +1 (up), or 0 (clear).
    pub value: i16,
}

/// Result of a cast as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub post_id: String,
    /// New aggregate score of the post.
    pub score: i64,
    /// The caller's vote after the cast.
    pub my_vote: i16,
}

/// Service for casting votes on posts.
#[derive(Clone)]
pub struct VoteService {
    vote_repo: PostVoteRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(vote_repo: PostVoteRepository, post_repo: PostRepository) -> Self {
        Self {
            vote_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Cast a vote on a post.
    ///
    /// Repeating the same value toggles the vote off, so the operation is
    /// idempotent over pairs of calls. Voting requires authentication but
    /// not community membership.
    pub async fn cast(
        &self,
        post_id: &str,
        user_id: &str,
        input: CastVoteInput,
    ) -> AppResult<VoteResponse> {
        if !matches!(input.value, -1 | 0 | 1) {
            return Err(AppError::Validation(
                "Vote value must be -1, 0, or 1".to_string(),
            ));
        }

        // The row must exist; soft-deleted posts keep their votes.
        let post = self.post_repo.get_by_id(post_id).await?;

        let outcome = self
            .vote_repo
            .cast(self.id_gen.generate(), &post.id, user_id, input.value)
            .await?;

        tracing::debug!(
            post_id = %post.id,
            user_id = %user_id,
            value = input.value,
            score = outcome.score,
            "vote cast"
        );

        Ok(VoteResponse {
            post_id: post.id,
            score: outcome.score,
            my_vote: outcome.my_vote,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_db::entities::post;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::sync::Arc;

    fn service(db: Arc<sea_orm::DatabaseConnection>) -> VoteService {
        VoteService::new(PostVoteRepository::new(db.clone()), PostRepository::new(db))
    }

    fn test_post() -> post::Model {
        post::Model {
            id: "p1".to_string(),
            community_id: "c1".to_string(),
            author_id: "u1".to_string(),
            title: "Hello".to_string(),
            body: String::new(),
            image_url: None,
            is_pinned: false,
            is_locked: false,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_cast_rejects_out_of_range_value() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let result = service(db)
            .cast("p1", "u1", CastVoteInput { value: 2 })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cast_missing_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let result = service(db)
            .cast("missing", "u1", CastVoteInput { value: 1 })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cast_upvote_on_fresh_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post()]])
                .append_query_results([Vec::<agora_db::entities::post_vote::Model>::new()])
                .append_query_results([[agora_db::entities::post_vote::Model {
                    id: "v1".to_string(),
                    post_id: "p1".to_string(),
                    user_id: "u1".to_string(),
                    value: 1,
                    created_at: Utc::now().into(),
                    updated_at: None,
                }]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[btreemap! { "total" => Value::from(Some(1i64)) }]])
                .into_connection(),
        );

        let result = service(db)
            .cast("p1", "u1", CastVoteInput { value: 1 })
            .await
            .unwrap();

        assert_eq!(result.score, 1);
        assert_eq!(result.my_vote, 1);
    }
}
