//! Vote repository.
//!
//! Casting a vote is a full toggle state machine run inside one
//! transaction: the new score is recomputed from the vote table before
//! commit, so the returned score reflects exactly the state this cast
//! produced.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, ModelTrait, QueryFilter, QuerySelect, Set, SqlErr, TransactionTrait,
};

use crate::entities::{PostVote, post_vote};

/// Outcome of a cast: the post's new score and the caller's resulting vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub score: i64,
    pub my_vote: i16,
}

#[derive(FromQueryResult)]
struct SumRow {
    total: Option<i64>,
}

/// Repository for vote operations.
#[derive(Clone)]
pub struct PostVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PostVoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Score of a post as seen by `conn`, 0 when there are no votes.
    async fn score_on<C: ConnectionTrait>(conn: &C, post_id: &str) -> AppResult<i64> {
        let row = PostVote::find()
            .select_only()
            .column_as(post_vote::Column::Value.sum(), "total")
            .filter(post_vote::Column::PostId.eq(post_id))
            .into_model::<SumRow>()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.and_then(|r| r.total).unwrap_or(0))
    }

    /// Apply a vote toggle for `(post, user)` and return the new state.
    ///
    /// - no existing vote, value +1/-1: insert
    /// - existing vote, same value: delete (toggle off)
    /// - existing vote, different value: update in place
    /// - value 0: delete whatever exists
    ///
    /// The unique index on `(post_id, user_id)` keeps concurrent casts to
    /// one row; a racing insert surfaces as `Conflict` and the client can
    /// simply retry.
    pub async fn cast(
        &self,
        vote_id: String,
        post_id: &str,
        user_id: &str,
        value: i16,
    ) -> AppResult<VoteOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let existing = PostVote::find()
            .filter(post_vote::Column::PostId.eq(post_id))
            .filter(post_vote::Column::UserId.eq(user_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let my_vote = match (existing, value) {
            (Some(vote), 0) => {
                vote.delete(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                0
            }
            (None, 0) => 0,
            (Some(vote), v) if vote.value == v => {
                vote.delete(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                0
            }
            (Some(vote), v) => {
                let mut active: post_vote::ActiveModel = vote.into();
                active.value = Set(v);
                active.updated_at = Set(Some(Utc::now().into()));
                active
                    .update(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                v
            }
            (None, v) => {
                let active = post_vote::ActiveModel {
                    id: Set(vote_id),
                    post_id: Set(post_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    value: Set(v),
                    created_at: Set(Utc::now().into()),
                    updated_at: Set(None),
                };
                active.insert(&txn).await.map_err(|e| match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        AppError::Conflict("Vote already recorded, retry".to_string())
                    }
                    _ => AppError::Database(e.to_string()),
                })?;
                v
            }
        };

        let score = Self::score_on(&txn, post_id).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(VoteOutcome { score, my_vote })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn existing_vote(value: i16) -> post_vote::Model {
        post_vote::Model {
            id: "v1".to_string(),
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            value,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn sum_row(total: Option<i64>) -> std::collections::BTreeMap<&'static str, Value> {
        btreemap! { "total" => Value::from(total) }
    }

    #[tokio::test]
    async fn test_cast_same_value_toggles_off() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing_vote(1)]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[sum_row(None)]])
                .into_connection(),
        );

        let repo = PostVoteRepository::new(db);
        let outcome = repo.cast("v2".to_string(), "p1", "u1", 1).await.unwrap();

        assert_eq!(outcome.my_vote, 0);
        assert_eq!(outcome.score, 0);
    }

    #[tokio::test]
    async fn test_cast_opposite_value_updates_in_place() {
        let flipped = post_vote::Model {
            value: -1,
            updated_at: Some(Utc::now().into()),
            ..existing_vote(1)
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing_vote(1)]])
                .append_query_results([[flipped]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[sum_row(Some(-1))]])
                .into_connection(),
        );

        let repo = PostVoteRepository::new(db);
        let outcome = repo.cast("v2".to_string(), "p1", "u1", -1).await.unwrap();

        assert_eq!(outcome.my_vote, -1);
        assert_eq!(outcome.score, -1);
    }

    #[tokio::test]
    async fn test_cast_zero_with_no_existing_vote_is_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post_vote::Model>::new()])
                .append_query_results([[sum_row(Some(3))]])
                .into_connection(),
        );

        let repo = PostVoteRepository::new(db);
        let outcome = repo.cast("v2".to_string(), "p1", "u1", 0).await.unwrap();

        assert_eq!(outcome.my_vote, 0);
        assert_eq!(outcome.score, 3);
    }
}
