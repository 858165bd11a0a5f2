//! API middleware.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use agora_core::{
    CommentService, CommunityService, FeedService, MediaService, MembershipService, PostService,
    VoteService,
};

/// Header carrying the identity asserted by the upstream identity provider.
/// The proxy strips any client-supplied value, so its presence is trusted.
pub const FORWARDED_USER_HEADER: &str = "x-forwarded-user";

/// The authenticated identity of a request.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub community_service: CommunityService,
    pub membership_service: MembershipService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub vote_service: VoteService,
    pub feed_service: FeedService,
    pub media_service: MediaService,
    /// Default page size for list endpoints.
    pub page_size: u64,
}

/// Principal middleware.
///
/// Reads the forwarded-user header and stores the identity in request
/// extensions. Requests without the header proceed anonymously.
pub async fn principal_middleware(mut req: Request<Body>, next: Next) -> Response {
    let user_id = req
        .headers()
        .get(FORWARDED_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    if let Some(user_id) = user_id {
        req.extensions_mut().insert(Principal(user_id));
    }

    next.run(req).await
}
