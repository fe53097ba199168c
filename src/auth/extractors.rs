use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tracing::warn;

use super::claims::Principal;
use crate::state::AppState;

/// Resolves the bearer token into a [`Principal`]. The token shape
/// (user session vs. edge-scoped device token) is fixed here, once,
/// for the rest of the request.
pub struct Auth(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "missing Authorization header".to_string(),
            ))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "invalid auth scheme".to_string(),
            ))?;

        let claims = state.jwt.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            (
                StatusCode::UNAUTHORIZED,
                "invalid or expired token".to_string(),
            )
        })?;

        Ok(Auth(Principal::from_claims(claims)))
    }
}
