//! Outbound event sinks

use piq_common::events::ProgressEvent;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// Receiving side is gone (client disconnected)
    #[error("Progress channel closed")]
    Closed,

    #[error("Progress channel I/O error: {0}")]
    Io(String),
}

/// Transport-agnostic destination for one subscriber's events
pub trait ProgressSink: Send + Sync {
    fn send(&self, event: &ProgressEvent) -> Result<(), SinkError>;
}

/// Sink feeding an in-process channel (drained by the SSE response)
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn send(&self, event: &ProgressEvent) -> Result<(), SinkError> {
        self.tx.send(event.clone()).map_err(|_| SinkError::Closed)
    }
}
