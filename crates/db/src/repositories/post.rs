//! Post repository.
//!
//! Feed listings are produced by one SELECT with correlated scalar
//! subqueries for the score (`COALESCE(SUM(value), 0)`), the viewer's own
//! vote, and the non-deleted comment count. Score is never stored; it is
//! always consistent with the vote table at read time.

use std::collections::HashMap;
use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, Func, Query, SimpleExpr, SubQueryStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::Serialize;

use crate::entities::{Comment, Post, PostImage, PostVote, comment, post, post_image, post_vote};

/// Sort key for feed listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrdering {
    /// Creation time (default).
    #[default]
    CreatedAt,
    /// Aggregate vote score.
    Score,
}

/// Filter for feed listings.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Restrict to one community.
    pub community_id: Option<String>,
}

/// Post row annotated with per-viewer and aggregate state.
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct AnnotatedPost {
    pub id: String,
    pub community_id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub is_deleted: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
    /// Sum of all vote values; 0 when the post has no votes.
    pub score: i64,
    /// The viewer's own vote (-1, 0, +1); 0 for anonymous viewers.
    pub my_vote: i64,
    /// Count of non-deleted comments.
    pub comment_count: i64,
}

/// `COALESCE(SUM(value), 0)` over all votes of the outer post row.
fn score_expr() -> SimpleExpr {
    let select = Query::select()
        .expr(Func::coalesce([
            Func::sum(Expr::col((PostVote, post_vote::Column::Value))).into(),
            Expr::val(0i64).into(),
        ]))
        .from(PostVote)
        .and_where(Expr::col((PostVote, post_vote::Column::PostId)).equals((Post, post::Column::Id)))
        .to_owned();

    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select)))
}

/// The viewer's own vote value, or 0 if the viewer has not voted.
fn my_vote_expr(viewer_id: Option<&str>) -> SimpleExpr {
    let Some(viewer_id) = viewer_id else {
        return Expr::val(0i64).into();
    };

    let select = Query::select()
        .expr(Expr::col((PostVote, post_vote::Column::Value)).cast_as(Alias::new("bigint")))
        .from(PostVote)
        .and_where(Expr::col((PostVote, post_vote::Column::PostId)).equals((Post, post::Column::Id)))
        .and_where(Expr::col((PostVote, post_vote::Column::UserId)).eq(viewer_id))
        .to_owned();

    Func::coalesce([
        SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select))),
        Expr::val(0i64).into(),
    ])
    .into()
}

/// `COUNT(*)` over non-deleted comments of the outer post row.
fn comment_count_expr() -> SimpleExpr {
    let select = Query::select()
        .expr(Func::count(Expr::col((Comment, comment::Column::Id))))
        .from(Comment)
        .and_where(Expr::col((Comment, comment::Column::PostId)).equals((Post, post::Column::Id)))
        .and_where(Expr::col((Comment, comment::Column::IsDeleted)).eq(false))
        .to_owned();

    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select)))
}

/// Non-deleted posts matching the filter.
fn visible_posts(filter: &PostFilter) -> Select<Post> {
    let mut query = Post::find().filter(post::Column::IsDeleted.eq(false));

    if let Some(community_id) = &filter.community_id {
        query = query.filter(post::Column::CommunityId.eq(community_id));
    }

    query
}

/// The one feed SELECT: annotations plus pinned-first ordering.
///
/// Pinned posts always sort first; within each group the requested sort
/// key applies, with id desc as the final tie-break for determinism.
fn feed_query(
    filter: &PostFilter,
    ordering: PostOrdering,
    order: Order,
    viewer_id: Option<&str>,
) -> Select<Post> {
    let query = visible_posts(filter)
        .column_as(score_expr(), "score")
        .column_as(my_vote_expr(viewer_id), "my_vote")
        .column_as(comment_count_expr(), "comment_count")
        .order_by(post::Column::IsPinned, Order::Desc);

    let query = match ordering {
        PostOrdering::CreatedAt => query.order_by(post::Column::CreatedAt, order),
        PostOrdering::Score => query.order_by(score_expr(), order),
    };

    query.order_by(post::Column::Id, Order::Desc)
}

/// Repository for post operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find post by ID (including soft-deleted rows).
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get post by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post not found: {id}")))
    }

    /// Get a visible (non-deleted) post with its annotations.
    pub async fn get_annotated(
        &self,
        id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<AnnotatedPost> {
        Post::find_by_id(id)
            .filter(post::Column::IsDeleted.eq(false))
            .column_as(score_expr(), "score")
            .column_as(my_vote_expr(viewer_id), "my_vote")
            .column_as(comment_count_expr(), "comment_count")
            .into_model::<AnnotatedPost>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Post not found: {id}")))
    }

    /// Create a post together with its ordered image rows, atomically.
    pub async fn create_with_images(
        &self,
        post: post::ActiveModel,
        images: Vec<post_image::ActiveModel>,
    ) -> AppResult<post::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = post
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for image in images {
            image
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set or clear the soft-delete flag.
    pub async fn set_deleted(&self, post: post::Model, deleted: bool) -> AppResult<post::Model> {
        let mut active: post::ActiveModel = post.into();
        active.is_deleted = Set(deleted);
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List visible posts, annotated and ordered pinned-first.
    pub async fn list_annotated(
        &self,
        filter: &PostFilter,
        ordering: PostOrdering,
        order: Order,
        viewer_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<AnnotatedPost>, u64)> {
        let total = visible_posts(filter)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let rows = feed_query(filter, ordering, order, viewer_id)
            .offset(offset)
            .limit(limit)
            .into_model::<AnnotatedPost>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((rows, total))
    }

    /// Images for a set of posts, keyed by post id, ordered `(position, id)`.
    pub async fn images_for_posts(
        &self,
        post_ids: &[String],
    ) -> AppResult<HashMap<String, Vec<post_image::Model>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PostImage::find()
            .filter(post_image::Column::PostId.is_in(post_ids.iter().cloned()))
            .order_by(post_image::Column::Position, Order::Asc)
            .order_by(post_image::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut map: HashMap<String, Vec<post_image::Model>> = HashMap::new();
        for row in rows {
            map.entry(row.post_id.clone()).or_default().push(row);
        }

        Ok(map)
    }

    /// Count non-deleted posts in a community per author.
    ///
    /// Used to annotate member listings with each member's post count.
    pub async fn count_by_authors(
        &self,
        community_id: &str,
        author_ids: &[String],
    ) -> AppResult<HashMap<String, i64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(FromQueryResult)]
        struct AuthorCount {
            author_id: String,
            posts: i64,
        }

        let rows = Post::find()
            .select_only()
            .column(post::Column::AuthorId)
            .column_as(post::Column::Id.count(), "posts")
            .filter(post::Column::CommunityId.eq(community_id))
            .filter(post::Column::AuthorId.is_in(author_ids.iter().cloned()))
            .filter(post::Column::IsDeleted.eq(false))
            .group_by(post::Column::AuthorId)
            .into_model::<AuthorCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|r| (r.author_id, r.posts)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    fn annotated_row(
        id: &str,
        pinned: bool,
        score: i64,
        my_vote: i64,
        comment_count: i64,
    ) -> std::collections::BTreeMap<&'static str, Value> {
        btreemap! {
            "id" => Value::from(id.to_string()),
            "community_id" => Value::from("c1"),
            "author_id" => Value::from("u1"),
            "title" => Value::from("Hello"),
            "body" => Value::from("First post"),
            "image_url" => Value::from(None::<String>),
            "is_pinned" => Value::from(pinned),
            "is_locked" => Value::from(false),
            "is_deleted" => Value::from(false),
            "created_at" => Value::from(DateTimeWithTimeZone::from(Utc::now())),
            "updated_at" => Value::from(None::<DateTimeWithTimeZone>),
            "score" => Value::from(score),
            "my_vote" => Value::from(my_vote),
            "comment_count" => Value::from(comment_count),
        }
    }

    #[tokio::test]
    async fn test_get_annotated() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[annotated_row("p1", false, 2, 1, 4)]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_annotated("p1", Some("u1")).await.unwrap();

        assert_eq!(result.score, 2);
        assert_eq!(result.my_vote, 1);
        assert_eq!(result.comment_count, 4);
    }

    #[tokio::test]
    async fn test_list_annotated_returns_rows_and_total() {
        let count_row = btreemap! { "num_items" => Value::from(2i64) };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![count_row]])
                .append_query_results([vec![
                    annotated_row("p2", true, 0, 0, 0),
                    annotated_row("p1", false, 5, 0, 2),
                ]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let (rows, total) = repo
            .list_annotated(
                &PostFilter::default(),
                PostOrdering::CreatedAt,
                Order::Desc,
                None,
                10,
                0,
            )
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_pinned);
    }

    #[test]
    fn test_feed_sql_orders_pinned_first_with_id_tiebreak() {
        use sea_orm::QueryTrait;

        let sql = feed_query(
            &PostFilter::default(),
            PostOrdering::CreatedAt,
            Order::Desc,
            None,
        )
        .build(DatabaseBackend::Postgres)
        .to_string();

        assert!(
            sql.contains(
                r#"ORDER BY "post"."is_pinned" DESC, "post"."created_at" DESC, "post"."id" DESC"#
            ),
            "unexpected ordering: {sql}"
        );
        assert!(sql.contains(r#"COALESCE(SUM("post_vote"."value"), 0)"#));
        assert!(sql.contains(r#""post"."is_deleted" = FALSE"#));
    }

    #[test]
    fn test_feed_sql_score_ordering_keeps_pinned_first() {
        use sea_orm::QueryTrait;

        let sql = feed_query(
            &PostFilter {
                community_id: Some("c1".to_string()),
            },
            PostOrdering::Score,
            Order::Asc,
            Some("u1"),
        )
        .build(DatabaseBackend::Postgres)
        .to_string();

        let order_by = sql.find("ORDER BY").unwrap();
        let (_, tail) = sql.split_at(order_by);

        assert!(tail.starts_with(r#"ORDER BY "post"."is_pinned" DESC"#));
        assert!(tail.ends_with(r#""post"."id" DESC"#), "missing tie-break: {tail}");
        assert!(sql.contains(r#""post"."community_id" = 'c1'"#));
    }

    #[tokio::test]
    async fn test_images_for_posts_empty() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PostRepository::new(db);
        let map = repo.images_for_posts(&[]).await.unwrap();

        assert!(map.is_empty());
    }
}
