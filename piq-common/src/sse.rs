//! Server-Sent Events (SSE) utilities
//!
//! Frames [`ProgressEvent`]s as named SSE events (`event: status|error|complete|connected`,
//! `data: <payload>`) and applies the shared keep-alive policy.

use crate::events::ProgressEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::debug;

/// Interval between keep-alive comments on idle streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Convert a progress event to an SSE frame
pub fn to_sse_event(event: &ProgressEvent) -> Event {
    Event::default()
        .event(event.event_type())
        .data(event.payload.as_str())
}

/// Wrap a stream of progress events into an SSE response with heartbeats
///
/// # Example
/// ```rust,ignore
/// pub async fn stream(rx: UnboundedReceiver<ProgressEvent>) -> impl IntoResponse {
///     piq_common::sse::progress_sse(UnboundedReceiverStream::new(rx))
/// }
/// ```
pub fn progress_sse<S>(events: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ProgressEvent> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            debug!(
                subscriber_id = event.subscriber_id,
                event_type = event.event_type(),
                "SSE: Sending progress event"
            );
            yield Ok::<_, Infallible>(to_sse_event(&event));
        }
        debug!("SSE: progress stream ended");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    async fn render(events: Vec<ProgressEvent>) -> String {
        let response = progress_sse(futures::stream::iter(events)).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status_frame_on_the_wire() {
        let body = render(vec![ProgressEvent::status(42, "Analyzing languages")]).await;
        assert_eq!(body, "event: status\ndata: Analyzing languages\n\n");
    }

    #[tokio::test]
    async fn test_frames_keep_order_and_names() {
        let body = render(vec![
            ProgressEvent::connected(42, "Connected to progress stream"),
            ProgressEvent::error(42, "Repository not found"),
            ProgressEvent::complete(42, "7"),
        ])
        .await;
        assert_eq!(
            body,
            "event: connected\ndata: Connected to progress stream\n\n\
             event: error\ndata: Repository not found\n\n\
             event: complete\ndata: 7\n\n"
        );
    }
}
