//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::middleware::Principal;

/// Authenticated principal extractor. Rejects with 401 when the request
/// carries no identity.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the principal middleware
        parts
            .extensions
            .get::<Principal>()
            .map(|p| Self(p.0.clone()))
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Optional principal extractor for endpoints that also serve anonymous
/// viewers.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<String>);

impl MaybeAuthUser {
    /// The principal id, if authenticated.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts.extensions.get::<Principal>().map(|p| p.0.clone()),
        ))
    }
}
