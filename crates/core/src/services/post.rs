//! Post service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::entities::{post, post_image};
use agora_db::repositories::{AnnotatedPost, PostRepository};
use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::membership::MembershipService;

/// Input for creating a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Already-uploaded image URLs in display order.
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Input for updating a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub body: Option<String>,
    /// Moderator-only flags.
    pub is_pinned: Option<bool>,
    pub is_locked: Option<bool>,
}

/// Image attached to a post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostImageResponse {
    pub id: String,
    pub image_url: String,
    pub position: i32,
}

impl From<post_image::Model> for PostImageResponse {
    fn from(model: post_image::Model) -> Self {
        Self {
            id: model.id,
            image_url: model.image_url,
            position: model.position,
        }
    }
}

/// Post as exposed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub community_id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub images: Vec<PostImageResponse>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub score: i64,
    pub my_vote: i64,
    pub comment_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PostResponse {
    #[must_use]
    pub fn from_annotated(row: AnnotatedPost, images: Vec<post_image::Model>) -> Self {
        Self {
            id: row.id,
            community_id: row.community_id,
            author_id: row.author_id,
            title: row.title,
            body: row.body,
            image_url: row.image_url,
            images: images.into_iter().map(Into::into).collect(),
            is_pinned: row.is_pinned,
            is_locked: row.is_locked,
            score: row.score,
            my_vote: row.my_vote,
            comment_count: row.comment_count,
            created_at: row.created_at.into(),
            updated_at: row.updated_at.map(Into::into),
        }
    }
}

/// Service for managing posts.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    membership_service: MembershipService,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, membership_service: MembershipService) -> Self {
        Self {
            post_repo,
            membership_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post in a community. Active membership required.
    pub async fn create(
        &self,
        community_id: &str,
        author_id: &str,
        input: CreatePostInput,
    ) -> AppResult<post::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        self.membership_service
            .require_active_member(community_id, author_id)
            .await?;

        let now = Utc::now();
        let post_id = self.id_gen.generate();

        // First image doubles as the legacy single image_url.
        let model = post::ActiveModel {
            id: Set(post_id.clone()),
            community_id: Set(community_id.to_string()),
            author_id: Set(author_id.to_string()),
            title: Set(input.title),
            body: Set(input.body),
            image_url: Set(input.image_urls.first().cloned()),
            is_pinned: Set(false),
            is_locked: Set(false),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let images = input
            .image_urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| post_image::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post_id.clone()),
                image_url: Set(url),
                position: Set(i as i32 + 1),
            })
            .collect();

        let created = self.post_repo.create_with_images(model, images).await?;

        tracing::info!(post_id = %created.id, community_id = %community_id, "post created");

        Ok(created)
    }

    /// Get a visible post with its annotations and images.
    pub async fn get(&self, post_id: &str, viewer_id: Option<&str>) -> AppResult<PostResponse> {
        let row = self.post_repo.get_annotated(post_id, viewer_id).await?;
        let mut images = self
            .post_repo
            .images_for_posts(&[row.id.clone()])
            .await?;
        let post_images = images.remove(&row.id).unwrap_or_default();

        Ok(PostResponse::from_annotated(row, post_images))
    }

    /// Update a post.
    ///
    /// Title and body: author or moderator. Pin and lock flags: moderator
    /// only, regardless of authorship.
    pub async fn update(
        &self,
        post_id: &str,
        user_id: &str,
        input: UpdatePostInput,
    ) -> AppResult<post::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let post = self.visible_post(post_id).await?;
        let role = self
            .membership_service
            .role_of(&post.community_id, user_id)
            .await?;
        let can_moderate = role.is_some_and(|r| r.can_moderate());

        if post.author_id != user_id && !can_moderate {
            return Err(AppError::Forbidden(
                "Only the author or a moderator can edit this post".to_string(),
            ));
        }
        if (input.is_pinned.is_some() || input.is_locked.is_some()) && !can_moderate {
            return Err(AppError::Forbidden(
                "Only moderators can pin or lock posts".to_string(),
            ));
        }

        let mut active: post::ActiveModel = post.into();

        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(body) = input.body {
            active.body = Set(body);
        }
        if let Some(is_pinned) = input.is_pinned {
            active.is_pinned = Set(is_pinned);
        }
        if let Some(is_locked) = input.is_locked {
            active.is_locked = Set(is_locked);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.post_repo.update(active).await
    }

    /// Soft-delete a post. Author or moderator.
    pub async fn delete(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let post = self.visible_post(post_id).await?;
        self.require_author_or_moderator(&post, user_id).await?;

        self.post_repo.set_deleted(post, true).await?;
        Ok(())
    }

    /// Restore a soft-deleted post. Author or moderator.
    pub async fn restore(&self, post_id: &str, user_id: &str) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if !post.is_deleted {
            return Err(AppError::Conflict("Post is not deleted".to_string()));
        }
        self.require_author_or_moderator(&post, user_id).await?;

        self.post_repo.set_deleted(post, false).await
    }

    async fn visible_post(&self, post_id: &str) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::NotFound(format!("Post not found: {post_id}")));
        }
        Ok(post)
    }

    async fn require_author_or_moderator(
        &self,
        post: &post::Model,
        user_id: &str,
    ) -> AppResult<()> {
        if post.author_id == user_id {
            return Ok(());
        }

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
