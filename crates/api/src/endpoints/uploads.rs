//! Upload endpoints.
//!
//! Files arrive as multipart form data and are handed to the media
//! service, which validates content types before anything is stored.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use agora_common::{AppError, AppResult};
use agora_core::{UploadInput, UploadResponse};

use crate::{extractors::AuthUser, middleware::AppState};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/uploads/community", post(upload_community_image))
        .route("/uploads/posts", post(upload_post_images))
}

async fn upload_community_image(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut inputs = collect_files(multipart).await?;
    let input = inputs
        .pop()
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    if !inputs.is_empty() {
        return Err(AppError::Validation(
            "Exactly one file expected".to_string(),
        ));
    }

    let response = state.media_service.upload_community_image(input).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn upload_post_images(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let inputs = collect_files(multipart).await?;
    if inputs.is_empty() {
        return Err(AppError::Validation("No files provided".to_string()));
    }

    let responses: Vec<UploadResponse> = state.media_service.upload_post_images(inputs).await?;
    Ok((StatusCode::CREATED, Json(responses)).into_response())
}

/// Drain every file field from a multipart body.
async fn collect_files(mut multipart: Multipart) -> AppResult<Vec<UploadInput>> {
    let mut inputs = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(ToString::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;

        inputs.push(UploadInput {
            filename,
            content_type,
            data: data.to_vec(),
        });
    }

    Ok(inputs)
}
