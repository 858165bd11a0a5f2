//! HTTP API layer for agora.
//!
//! - **Endpoints**: REST surface for communities, posts, comments, votes,
//!   and uploads
//! - **Extractors**: principal identity, pagination
//! - **Middleware**: forwarded-principal resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
