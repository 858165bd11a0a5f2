//! Community service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::entities::community::Visibility;
use agora_db::entities::membership::MembershipRole;
use agora_db::entities::{community, membership};
use agora_db::repositories::{
    CommunityOrdering, CommunityRepository, CommunityWithCounts, MembershipRepository,
};
use chrono::Utc;
use sea_orm::{Order, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum slug length.
const MAX_SLUG_LEN: usize = 50;

/// Input for creating a community.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommunityInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Slug source; defaults to the name. Normalized before use.
    pub slug: Option<String>,
    #[validate(length(max = 2048))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
}

/// Input for updating a community. The slug is immutable.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommunityInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub icon_url: Option<Option<String>>,
    pub banner_url: Option<Option<String>>,
}

/// Query parameters for directory listings.
#[derive(Debug, Clone, Default)]
pub struct ListCommunitiesQuery {
    /// Search term matched against slug, name, and description.
    pub search: Option<String>,
    /// Ordering key, optionally prefixed with `-` for descending.
    pub ordering: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

/// Community as exposed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityResponse {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    pub created_by: String,
    pub members_count: i64,
    pub posts_count: i64,
    pub is_member: bool,
    pub my_role: Option<MembershipRole>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CommunityResponse {
    fn from_counts(row: CommunityWithCounts, my_role: Option<MembershipRole>) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            visibility: row.visibility,
            icon_url: row.icon_url,
            banner_url: row.banner_url,
            created_by: row.created_by,
            members_count: row.members_count,
            posts_count: row.posts_count,
            is_member: my_role.is_some_and(MembershipRole::is_active),
            my_role,
            created_at: row.created_at.into(),
        }
    }
}

/// Normalize a slug source into its canonical form.
///
/// Lowercases, maps any run of non-alphanumeric characters to a single
/// hyphen, and trims hyphens from both ends.
#[must_use]
pub fn slugify(source: &str) -> String {
    let mut slug = String::with_capacity(source.len());
    let mut last_was_hyphen = true;

    for c in source.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// Parse an `ordering` query value into key and direction.
///
/// Unknown keys fall back to newest-first.
fn parse_ordering(ordering: Option<&str>) -> (CommunityOrdering, Order) {
    let raw = ordering.unwrap_or("-created_at");
    let (key, order) = match raw.strip_prefix('-') {
        Some(key) => (key, Order::Desc),
        None => (raw, Order::Asc),
    };

    match key {
        "created_at" => (CommunityOrdering::CreatedAt, order),
        "name" => (CommunityOrdering::Name, order),
        "members_count" => (CommunityOrdering::MembersCount, order),
        _ => (CommunityOrdering::CreatedAt, Order::Desc),
    }
}

/// Service for managing communities.
#[derive(Clone)]
pub struct CommunityService {
    community_repo: CommunityRepository,
    membership_repo: MembershipRepository,
    id_gen: IdGenerator,
}

impl CommunityService {
    /// Create a new community service.
    #[must_use]
    pub const fn new(
        community_repo: CommunityRepository,
        membership_repo: MembershipRepository,
    ) -> Self {
        Self {
            community_repo,
            membership_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Look up a community by slug.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<community::Model> {
        self.community_repo.get_by_slug(slug).await
    }

    /// Create a community.
    ///
    /// The creator becomes the first owner; community and membership are
    /// written in one transaction.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateCommunityInput,
    ) -> AppResult<community::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let slug = slugify(input.slug.as_deref().unwrap_or(&input.name));
        if slug.is_empty() {
            return Err(AppError::Validation(
                "Slug must contain at least one alphanumeric character".to_string(),
            ));
        }
        if slug.len() > MAX_SLUG_LEN {
            return Err(AppError::Validation(format!(
                "Slug must be at most {MAX_SLUG_LEN} characters"
            )));
        }

        let now = Utc::now();
        let community_id = self.id_gen.generate();

        let community = community::ActiveModel {
            id: Set(community_id.clone()),
            slug: Set(slug),
            name: Set(input.name),
            description: Set(input.description),
            visibility: Set(input.visibility),
            icon_url: Set(input.icon_url),
            banner_url: Set(input.banner_url),
            created_by: Set(user_id.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let owner_membership = membership::ActiveModel {
            id: Set(self.id_gen.generate()),
            community_id: Set(community_id),
            user_id: Set(user_id.to_string()),
            role: Set(MembershipRole::Owner),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let created = self
            .community_repo
            .create_with_owner(community, owner_membership)
            .await?;

        tracing::info!(community_id = %created.id, slug = %created.slug, "community created");

        Ok(created)
    }

    /// Get a community with counts and the viewer's role.
    pub async fn get(&self, slug: &str, viewer_id: Option<&str>) -> AppResult<CommunityResponse> {
        let row = self.community_repo.get_annotated_by_slug(slug).await?;

        let my_role = match viewer_id {
            Some(user_id) => self.membership_repo.role_of(&row.id, user_id).await?,
            None => None,
        };

        Ok(CommunityResponse::from_counts(row, my_role))
    }

    /// List the directory, annotated with counts and viewer roles.
    pub async fn list(
        &self,
        query: &ListCommunitiesQuery,
        viewer_id: Option<&str>,
    ) -> AppResult<(Vec<CommunityResponse>, u64)> {
        let (ordering, order) = parse_ordering(query.ordering.as_deref());

        let (rows, total) = self
            .community_repo
            .list_annotated(
                query.search.as_deref().filter(|s| !s.trim().is_empty()),
                None,
                ordering,
                order,
                query.limit,
                query.offset,
            )
            .await?;

        let responses = self.attach_viewer_roles(rows, viewer_id).await?;
        Ok((responses, total))
    }

    /// List communities the viewer owns or moderates.
    pub async fn list_managed(
        &self,
        viewer_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<CommunityResponse>, u64)> {
        let managed_ids = self
            .membership_repo
            .community_ids_with_roles(
                viewer_id,
                &[MembershipRole::Owner, MembershipRole::Moderator],
            )
            .await?;

        let (rows, total) = self
            .community_repo
            .list_annotated(
                None,
                Some(&managed_ids),
                CommunityOrdering::CreatedAt,
                Order::Desc,
                limit,
                offset,
            )
            .await?;

        let responses = self.attach_viewer_roles(rows, Some(viewer_id)).await?;
        Ok((responses, total))
    }

    /// Update a community. Owner only; the slug never changes.
    pub async fn update(
        &self,
        slug: &str,
        user_id: &str,
        input: UpdateCommunityInput,
    ) -> AppResult<community::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let community = self.community_repo.get_by_slug(slug).await?;
        self.require_owner(&community.id, user_id).await?;

        let mut active: community::ActiveModel = community.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(visibility) = input.visibility {
            active.visibility = Set(visibility);
        }
        if let Some(icon_url) = input.icon_url {
            active.icon_url = Set(icon_url);
        }
        if let Some(banner_url) = input.banner_url {
            active.banner_url = Set(banner_url);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.community_repo.update(active).await
    }

    /// Delete a community. Owner only; cascades to posts and memberships.
    pub async fn delete(&self, slug: &str, user_id: &str) -> AppResult<()> {
        let community = self.community_repo.get_by_slug(slug).await?;
        self.require_owner(&community.id, user_id).await?;

        self.community_repo.delete(&community.id).await?;

        tracing::info!(community_id = %community.id, slug = %community.slug, "community deleted");

        Ok(())
    }

    async fn require_owner(&self, community_id: &str, user_id: &str) -> AppResult<()> {
        match self.membership_repo.role_of(community_id, user_id).await? {
            Some(role) if role.is_owner() => Ok(()),
            _ => Err(AppError::Forbidden("Owner privileges required".to_string())),
        }
    }

    /// Attach the viewer's role to a page of annotated rows in one query.
    async fn attach_viewer_roles(
        &self,
        rows: Vec<CommunityWithCounts>,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<CommunityResponse>> {
        let roles = match viewer_id {
            Some(user_id) => {
                let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
                self.membership_repo.map_for_user(user_id, &ids).await?
            }
            None => std::collections::HashMap::new(),
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let my_role = roles.get(&row.id).map(|m| m.role);
                CommunityResponse::from_counts(row, my_role)
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Rustaceans"), "rustaceans");
        assert_eq!(slugify("The Rust Programming Language"), "the-rust-programming-language");
    }

    #[test]
    fn test_slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("hello -- world!!"), "hello-world");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
    }

    #[test]
    fn test_slugify_non_ascii_dropped() {
        assert_eq!(slugify("café ☕ corner"), "caf-corner");
    }

    #[test]
    fn test_slugify_empty_when_nothing_survives() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_parse_ordering_defaults_and_fallback() {
        assert_eq!(
            parse_ordering(None),
            (CommunityOrdering::CreatedAt, Order::Desc)
        );
        assert_eq!(
            parse_ordering(Some("name")),
            (CommunityOrdering::Name, Order::Asc)
        );
        assert_eq!(
            parse_ordering(Some("-members_count")),
            (CommunityOrdering::MembersCount, Order::Desc)
        );
        assert_eq!(
            parse_ordering(Some("popularity")),
            (CommunityOrdering::CreatedAt, Order::Desc)
        );
    }
}
