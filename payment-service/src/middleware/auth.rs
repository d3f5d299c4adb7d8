//! Authenticated caller context.
//!
//! Extracts the user identity from request headers set by the upstream auth
//! layer after session validation. The webhook endpoint never uses this:
//! gateway deliveries carry no session and authenticate via HMAC instead.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
            })?;

        let span = tracing::Span::current();
        span.record("user_id", user_id);

        Ok(AuthContext {
            user_id: user_id.to_string(),
        })
    }
}
