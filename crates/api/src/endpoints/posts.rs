//! Post endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use agora_common::AppResult;
use agora_core::{
    CastVoteInput, CreateCommentInput, FeedQuery, PostResponse, UpdatePostInput, VoteResponse,
};
use agora_db::repositories::CommentFilter;
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{Page, Pagination},
};

/// Query parameters for the global feed.
#[derive(Debug, Deserialize)]
pub struct FeedParams {
    /// Community slug filter.
    pub community: Option<String>,
    /// Community id filter; wins over `community` when both are given.
    pub community_id: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Query parameters for comment listings.
#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    /// Filter by parent comment id; the empty string selects top-level
    /// comments only. Absent means the whole thread.
    pub parent: Option<String>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

impl CommentListParams {
    fn filter(&self) -> CommentFilter {
        CommentFilter {
            parent_id: self.parent.as_ref().map(|p| {
                if p.is_empty() {
                    None
                } else {
                    Some(p.clone())
                }
            }),
        }
    }
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/{id}/restore", post(restore_post))
        .route("/posts/{id}/vote", post(cast_vote))
        .route(
            "/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(params): Query<FeedParams>,
) -> AppResult<Json<Page<PostResponse>>> {
    let limit = Pagination {
        limit: params.limit,
        offset: params.offset,
    }
    .limit_or(state.page_size);
    let offset = params.offset;

    let query = FeedQuery {
        community_id: params.community_id,
        community_slug: params.community,
        ordering: params.ordering,
        limit,
        offset,
    };
    let (results, count) = state.feed_service.list(&query, viewer.id()).await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostResponse>> {
    let response = state.post_service.get(&id, viewer.id()).await?;
    Ok(Json(response))
}

async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdatePostInput>,
) -> AppResult<Json<PostResponse>> {
    state.post_service.update(&id, &user_id, input).await?;
    let response = state.post_service.get(&id, Some(&user_id)).await?;
    Ok(Json(response))
}

async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.post_service.delete(&id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restore_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostResponse>> {
    state.post_service.restore(&id, &user_id).await?;
    let response = state.post_service.get(&id, Some(&user_id)).await?;
    Ok(Json(response))
}

async fn cast_vote(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<CastVoteInput>,
) -> AppResult<Json<VoteResponse>> {
    let response = state.vote_service.cast(&id, &user_id, input).await?;
    Ok(Json(response))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CommentListParams>,
) -> AppResult<Json<Page<agora_core::CommentResponse>>> {
    let limit = Pagination {
        limit: params.limit,
        offset: params.offset,
    }
    .limit_or(state.page_size);
    let offset = params.offset;

    let (results, count) = state
        .comment_service
        .list(&id, &params.filter(), limit, offset)
        .await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<CreateCommentInput>,
) -> AppResult<Response> {
    let created = state.comment_service.create(&id, &user_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(agora_core::CommentResponse::from(created)),
    )
        .into_response())
}
