//! Authenticated identity extraction
//!
//! Tokens are verified by the upstream gateway, which forwards the user id in
//! a trusted header (`x-authenticated-user` by default).

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use piq_common::events::SubscriberId;

/// User id of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub SubscriberId);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(state.identity_header.as_str())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<SubscriberId>().ok())
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError::Unauthorized("Invalid authenticated user id".to_string()))
    }
}
