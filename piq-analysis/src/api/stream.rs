//! Server-Sent Events (SSE) for analysis progress
//!
//! One stream per user; opening a new one replaces the previous stream.
//! Events: `connected`, `status`, `error`, `complete`.

use super::identity::AuthenticatedUser;
use crate::error::ApiResult;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use piq_common::events::SubscriberId;
use std::convert::Infallible;
use tracing::info;

/// GET /api/analysis/stream/:user_id
pub async fn progress_stream(
    State(state): State<AppState>,
    AuthenticatedUser(authenticated_id): AuthenticatedUser,
    Path(user_id): Path<SubscriberId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut channel = state.hub.subscribe(authenticated_id, user_id)?;
    info!(user_id, "SSE client connected to analysis progress");

    // The channel (and its registry guard) lives as long as the response stream
    let events = async_stream::stream! {
        while let Some(event) = channel.recv().await {
            yield event;
        }
    };

    Ok(piq_common::sse::progress_sse(events))
}

pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/api/analysis/stream/:user_id", get(progress_stream))
}
