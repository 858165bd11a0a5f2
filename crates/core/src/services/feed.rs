//! Feed service.
//!
//! Turns listing queries into one annotated SQL statement plus one image
//! fetch for the returned page.

use agora_common::{AppError, AppResult};
use agora_db::repositories::{
    CommunityRepository, PostFilter, PostOrdering, PostRepository,
};
use sea_orm::Order;

use super::post::PostResponse;

/// Query parameters for feed listings.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Restrict to one community by id. Takes precedence over the slug.
    pub community_id: Option<String>,
    /// Restrict to one community by slug.
    pub community_slug: Option<String>,
    /// Ordering key (`created_at` or `score`), `-` prefix for descending.
    pub ordering: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

/// Parse an `ordering` query value; unknown keys fall back to newest-first.
fn parse_ordering(ordering: Option<&str>) -> (PostOrdering, Order) {
    let raw = ordering.unwrap_or("-created_at");
    let (key, order) = match raw.strip_prefix('-') {
        Some(key) => (key, Order::Desc),
        None => (raw, Order::Asc),
    };

    match key {
        "created_at" => (PostOrdering::CreatedAt, order),
        "score" => (PostOrdering::Score, order),
        _ => (PostOrdering::CreatedAt, Order::Desc),
    }
}

/// Service producing post listings.
#[derive(Clone)]
pub struct FeedService {
    post_repo: PostRepository,
    community_repo: CommunityRepository,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, community_repo: CommunityRepository) -> Self {
        Self {
            post_repo,
            community_repo,
        }
    }

    /// List visible posts: annotated, ordered pinned-first, paginated.
    pub async fn list(
        &self,
        query: &FeedQuery,
        viewer_id: Option<&str>,
    ) -> AppResult<(Vec<PostResponse>, u64)> {
        let mut filter = PostFilter::default();
        if let Some(id) = &query.community_id {
            let community = self
                .community_repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Community not found: {id}")))?;
            filter.community_id = Some(community.id);
        } else if let Some(slug) = &query.community_slug {
            let community = self.community_repo.get_by_slug(slug).await?;
            filter.community_id = Some(community.id);
        }

        let (ordering, order) = parse_ordering(query.ordering.as_deref());

        let (rows, total) = self
            .post_repo
            .list_annotated(&filter, ordering, order, viewer_id, query.limit, query.offset)
            .await?;

        let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut images = self.post_repo.images_for_posts(&post_ids).await?;

        let responses = rows
            .into_iter()
            .map(|row| {
                let post_images = images.remove(&row.id).unwrap_or_default();
                PostResponse::from_annotated(row, post_images)
            })
            .collect();

        Ok((responses, total))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_db::entities::community::{self, Visibility};
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn test_community() -> community::Model {
        community::Model {
            id: "c1".to_string(),
            slug: "rustaceans".to_string(),
            name: "Rustaceans".to_string(),
            description: String::new(),
            visibility: Visibility::Public,
            icon_url: None,
            banner_url: None,
            created_by: "u0".to_string(),
            created_at: chrono::Utc::now().into(),
            updated_at: None,
        }
    }

    fn service(db: Arc<sea_orm::DatabaseConnection>) -> FeedService {
        FeedService::new(PostRepository::new(db.clone()), CommunityRepository::new(db))
    }

    #[tokio::test]
    async fn test_list_resolves_community_id_filter() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_community()]])
                .append_query_results([[btreemap! { "num_items" => Value::from(0i64) }]])
                .append_query_results([Vec::<BTreeMap<&'static str, Value>>::new()])
                .into_connection(),
        );

        let query = FeedQuery {
            community_id: Some("c1".to_string()),
            limit: 10,
            ..FeedQuery::default()
        };
        let (rows, total) = service(db).list(&query, None).await.unwrap();

        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_list_unknown_community_id_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<community::Model>::new()])
                .into_connection(),
        );

        let query = FeedQuery {
            community_id: Some("missing".to_string()),
            limit: 10,
            ..FeedQuery::default()
        };
        let result = service(db).list(&query, None).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(parse_ordering(None), (PostOrdering::CreatedAt, Order::Desc));
        assert_eq!(
            parse_ordering(Some("score")),
            (PostOrdering::Score, Order::Asc)
        );
        assert_eq!(
            parse_ordering(Some("-score")),
            (PostOrdering::Score, Order::Desc)
        );
        assert_eq!(
            parse_ordering(Some("hotness")),
            (PostOrdering::CreatedAt, Order::Desc)
        );
    }
}
