//! Authenticated principal forwarded by the auth layer in front of this service.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the authenticated user. Set by the upstream auth layer, never by clients.
pub const AUTHENTICATED_USER_HEADER: &str = "X-Authenticated-User";

/// Optional identity from `X-Authenticated-User`. `None` on public routes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity(pub Option<String>);

impl Identity {
    /// Value for log fields; `anonymous` when absent.
    pub fn principal(&self) -> &str {
        self.0.as_deref().unwrap_or("anonymous")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHENTICATED_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(Identity(value))
    }
}
