//! Bearer token authentication.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// The operator behind an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(pub String);

#[async_trait]
impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        match state.tokens.operator_for(token) {
            Some(operator) => Ok(Operator(operator.to_string())),
            None => {
                warn!(uri = %parts.uri, "Rejected request with unknown token");
                Err(ApiError::Unauthorized("Invalid bearer token".to_string()))
            }
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
