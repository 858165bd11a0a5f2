//! API endpoints.

pub mod comments;
pub mod communities;
pub mod posts;
pub mod uploads;

use axum::{Router, middleware::from_fn};

use crate::middleware::{AppState, principal_middleware};

/// Build the API router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(communities::router())
                .merge(posts::router())
                .merge(comments::router())
                .merge(uploads::router()),
        )
        .layer(from_fn(principal_middleware))
        .with_state(state)
}
