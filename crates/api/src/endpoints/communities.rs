//! Community endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use agora_common::AppResult;
use agora_core::{
    CommunityResponse, CreateCommunityInput, CreatePostInput, FeedQuery, JoinOutcome,
    ListCommunitiesQuery, UpdateCommunityInput,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{Page, Pagination},
};

/// Query parameters for the community directory.
#[derive(Debug, Deserialize)]
pub struct ListCommunitiesParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Query parameters for a community's post listing.
#[derive(Debug, Deserialize)]
pub struct CommunityPostsParams {
    pub ordering: Option<String>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/communities", get(list_communities).post(create_community))
        .route("/communities/managed", get(list_managed))
        .route(
            "/communities/{slug}",
            get(get_community)
                .patch(update_community)
                .delete(delete_community),
        )
        .route("/communities/{slug}/join", post(join_community))
        .route("/communities/{slug}/leave", post(leave_community))
        .route("/communities/{slug}/members", get(list_members))
        .route("/communities/{slug}/members/pending", get(list_pending))
        .route(
            "/communities/{slug}/members/{membership_id}",
            delete(remove_member),
        )
        .route(
            "/communities/{slug}/members/{membership_id}/promote",
            post(promote_member),
        )
        .route(
            "/communities/{slug}/members/{membership_id}/demote",
            post(demote_member),
        )
        .route(
            "/communities/{slug}/members/{membership_id}/approve",
            post(approve_member),
        )
        .route(
            "/communities/{slug}/members/{membership_id}/decline",
            post(decline_member),
        )
        .route(
            "/communities/{slug}/posts",
            get(list_community_posts).post(create_post),
        )
}

async fn list_communities(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(params): Query<ListCommunitiesParams>,
) -> AppResult<Json<Page<CommunityResponse>>> {
    let limit = Pagination {
        limit: params.limit,
        offset: params.offset,
    }
    .limit_or(state.page_size);
    let offset = params.offset;

    let query = ListCommunitiesQuery {
        search: params.search,
        ordering: params.ordering,
        limit,
        offset,
    };
    let (results, count) = state.community_service.list(&query, viewer.id()).await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn list_managed(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Page<CommunityResponse>>> {
    let limit = pagination.limit_or(state.page_size);
    let offset = pagination.offset;

    let (results, count) = state
        .community_service
        .list_managed(&user_id, limit, offset)
        .await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn create_community(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<CreateCommunityInput>,
) -> AppResult<Response> {
    let created = state.community_service.create(&user_id, input).await?;
    let response = state
        .community_service
        .get(&created.slug, Some(&user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn get_community(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(slug): Path<String>,
) -> AppResult<Json<CommunityResponse>> {
    let response = state.community_service.get(&slug, viewer.id()).await?;
    Ok(Json(response))
}

async fn update_community(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    Json(input): Json<UpdateCommunityInput>,
) -> AppResult<Json<CommunityResponse>> {
    state.community_service.update(&slug, &user_id, input).await?;
    let response = state.community_service.get(&slug, Some(&user_id)).await?;
    Ok(Json(response))
}

async fn delete_community(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.community_service.delete(&slug, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_community(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let community = state.community_service.get_by_slug(&slug).await?;
    let outcome = state.membership_service.join(&community, &user_id).await?;

    Ok(match outcome {
        JoinOutcome::Joined(m) | JoinOutcome::Requested(m) => {
            (StatusCode::CREATED, Json(m)).into_response()
        }
        JoinOutcome::AlreadyPending => (
            StatusCode::OK,
            Json(json!({ "detail": "request already pending" })),
        )
            .into_response(),
        JoinOutcome::AlreadyMember => (
            StatusCode::CONFLICT,
            Json(json!({ "detail": "already a member" })),
        )
            .into_response(),
    })
}

async fn leave_community(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    let community = state.community_service.get_by_slug(&slug).await?;
    state.membership_service.leave(&community.id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Page<agora_core::MemberResponse>>> {
    let community = state.community_service.get_by_slug(&slug).await?;
    state
        .membership_service
        .require_moderator(&community.id, &user_id)
        .await?;

    let limit = pagination.limit_or(state.page_size);
    let offset = pagination.offset;
    let (results, count) = state
        .membership_service
        .list_members(&community.id, limit, offset)
        .await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn list_pending(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Page<agora_core::MemberResponse>>> {
    let community = state.community_service.get_by_slug(&slug).await?;
    state
        .membership_service
        .require_moderator(&community.id, &user_id)
        .await?;

    let limit = pagination.limit_or(state.page_size);
    let offset = pagination.offset;
    let (results, count) = state
        .membership_service
        .list_pending(&community.id, limit, offset)
        .await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn promote_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((slug, membership_id)): Path<(String, String)>,
) -> AppResult<Json<agora_db::entities::membership::Model>> {
    let community = require_role(&state, &slug, &user_id, RoleGate::Owner).await?;
    let updated = state
        .membership_service
        .promote(&community, &membership_id)
        .await?;
    Ok(Json(updated))
}

async fn demote_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((slug, membership_id)): Path<(String, String)>,
) -> AppResult<Json<agora_db::entities::membership::Model>> {
    let community = require_role(&state, &slug, &user_id, RoleGate::Owner).await?;
    let updated = state
        .membership_service
        .demote(&community, &membership_id)
        .await?;
    Ok(Json(updated))
}

async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((slug, membership_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let community = require_role(&state, &slug, &user_id, RoleGate::Owner).await?;
    state
        .membership_service
        .remove(&community, &membership_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((slug, membership_id)): Path<(String, String)>,
) -> AppResult<Json<agora_db::entities::membership::Model>> {
    let community = require_role(&state, &slug, &user_id, RoleGate::Moderator).await?;
    let updated = state
        .membership_service
        .approve(&community, &membership_id)
        .await?;
    Ok(Json(updated))
}

async fn decline_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((slug, membership_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let community = require_role(&state, &slug, &user_id, RoleGate::Moderator).await?;
    state
        .membership_service
        .decline(&community, &membership_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_community_posts(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(slug): Path<String>,
    Query(params): Query<CommunityPostsParams>,
) -> AppResult<Json<Page<agora_core::PostResponse>>> {
    let limit = Pagination {
        limit: params.limit,
        offset: params.offset,
    }
    .limit_or(state.page_size);
    let offset = params.offset;

    let query = FeedQuery {
        community_id: None,
        community_slug: Some(slug),
        ordering: params.ordering,
        limit,
        offset,
    };
    let (results, count) = state.feed_service.list(&query, viewer.id()).await?;

    Ok(Json(Page::new(results, count, limit, offset)))
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(slug): Path<String>,
    Json(input): Json<CreatePostInput>,
) -> AppResult<Response> {
    let community = state.community_service.get_by_slug(&slug).await?;
    let created = state
        .post_service
        .create(&community.id, &user_id, input)
        .await?;
    let response = state.post_service.get(&created.id, Some(&user_id)).await?;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

enum RoleGate {
    Owner,
    Moderator,
}

/// Resolve a community by slug and check the acting user's role.
/// Returns the community id.
async fn require_role(
    state: &AppState,
    slug: &str,
    user_id: &str,
    gate: RoleGate,
) -> AppResult<String> {
    let community = state.community_service.get_by_slug(slug).await?;
    match gate {
        RoleGate::Owner => {
            state
                .membership_service
                .require_owner(&community.id, user_id)
                .await?;
        }
        RoleGate::Moderator => {
            state
                .membership_service
                .require_moderator(&community.id, user_id)
                .await?;
        }
    }
    Ok(community.id)
}
