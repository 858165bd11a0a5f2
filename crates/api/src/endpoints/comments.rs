//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::patch,
};
use agora_common::AppResult;
use agora_core::{CommentResponse, UpdateCommentInput};

use crate::{extractors::AuthUser, middleware::AppState};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/comments/{id}", patch(update_comment).delete(delete_comment))
}

async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateCommentInput>,
) -> AppResult<Json<CommentResponse>> {
    let updated = state.comment_service.update(&id, &user_id, input).await?;
    Ok(Json(CommentResponse::from(updated)))
}

async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.comment_service.delete(&id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
