//! Progress event types
//!
//! Events are produced by the analysis run, routed through the progress hub
//! and framed as named SSE events by [`crate::sse`].

use serde::{Deserialize, Serialize};

/// Identity of a progress subscriber (the authenticated user id)
pub type SubscriberId = i64;

/// Kind of a progress event
///
/// The lowercase name doubles as the SSE `event:` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressEventKind {
    /// Intermediate stage update
    Status,
    /// Run aborted; payload is a short user-facing message
    Error,
    /// Run finished; payload identifies the stored result
    Complete,
    /// Sent once when a subscription is opened
    Connected,
}

impl ProgressEventKind {
    /// SSE event name for this kind
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEventKind::Status => "status",
            ProgressEventKind::Error => "error",
            ProgressEventKind::Complete => "complete",
            ProgressEventKind::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_type())
    }
}

/// Immutable progress message addressed to one subscriber
///
/// Fire-and-forget: there is no acknowledgement and no persistence. If the
/// subscriber has no open channel the event is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressEventKind,
    pub payload: String,
    pub subscriber_id: SubscriberId,
}

impl ProgressEvent {
    pub fn new(subscriber_id: SubscriberId, kind: ProgressEventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            subscriber_id,
        }
    }

    pub fn status(subscriber_id: SubscriberId, payload: impl Into<String>) -> Self {
        Self::new(subscriber_id, ProgressEventKind::Status, payload)
    }

    pub fn error(subscriber_id: SubscriberId, payload: impl Into<String>) -> Self {
        Self::new(subscriber_id, ProgressEventKind::Error, payload)
    }

    pub fn complete(subscriber_id: SubscriberId, payload: impl Into<String>) -> Self {
        Self::new(subscriber_id, ProgressEventKind::Complete, payload)
    }

    pub fn connected(subscriber_id: SubscriberId, payload: impl Into<String>) -> Self {
        Self::new(subscriber_id, ProgressEventKind::Connected, payload)
    }

    /// SSE event name (see [`ProgressEventKind::event_type`])
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(ProgressEvent::status(1, "x").event_type(), "status");
        assert_eq!(ProgressEvent::error(1, "x").event_type(), "error");
        assert_eq!(ProgressEvent::complete(1, "x").event_type(), "complete");
        assert_eq!(ProgressEvent::connected(1, "x").event_type(), "connected");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let event = ProgressEvent::complete(42, "7");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "complete");
        assert_eq!(json["payload"], "7");
        assert_eq!(json["subscriber_id"], 42);
    }
}
