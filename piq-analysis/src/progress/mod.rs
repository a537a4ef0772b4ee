//! Progress hub
//!
//! Registry of at most one live channel per subscriber. A new subscription
//! replaces the old one; a failed send, an explicit completion or an idle
//! timeout removes it. `publish` never fails its caller.
//!
//! Every registration carries a generation number so that cleanup triggered
//! by an old channel (send failure, stream drop) cannot evict its replacement.

mod sink;

pub use sink::{ChannelSink, ProgressSink, SinkError};

use piq_common::events::{ProgressEvent, ProgressEventKind, SubscriberId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default idle window before a subscription is closed
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Payload of the Connected event
pub const CONNECTED_MESSAGE: &str = "Connection established";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// Authenticated identity does not own the requested subscription
    #[error("Subscriber {requested} does not match authenticated user {authenticated}")]
    Forbidden {
        authenticated: SubscriberId,
        requested: SubscriberId,
    },

    /// The Connected event could not be delivered to the new channel
    #[error("Progress channel closed before connection completed")]
    ChannelClosed,
}

struct Subscription {
    sink: Box<dyn ProgressSink>,
    generation: u64,
    opened_at: Instant,
    last_activity: Instant,
}

impl Subscription {
    fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.duration_since(self.last_activity) >= idle_timeout
    }
}

/// Registration receipt; identifies exactly one generation of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub subscriber_id: SubscriberId,
    pub generation: u64,
}

pub struct ProgressHub {
    subscriptions: Mutex<HashMap<SubscriberId, Subscription>>,
    next_generation: AtomicU64,
    idle_timeout: Duration,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl ProgressHub {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    // Sinks never panic while the lock is held, but a poisoned registry must
    // still be usable since publish cannot fail.
    fn registry(&self) -> MutexGuard<'_, HashMap<SubscriberId, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a sink for `subscriber_id`, replacing any existing one
    ///
    /// Rejects the call if the authenticated identity is someone else. Sends
    /// a Connected event to the new sink before returning.
    pub fn register(
        &self,
        authenticated_id: SubscriberId,
        subscriber_id: SubscriberId,
        sink: Box<dyn ProgressSink>,
    ) -> Result<SubscriptionHandle, HubError> {
        if authenticated_id != subscriber_id {
            warn!(
                authenticated_id,
                subscriber_id, "Rejected progress subscription for another user"
            );
            return Err(HubError::Forbidden {
                authenticated: authenticated_id,
                requested: subscriber_id,
            });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let connected = ProgressEvent::connected(subscriber_id, CONNECTED_MESSAGE);

        let mut registry = self.registry();
        if sink.send(&connected).is_err() {
            return Err(HubError::ChannelClosed);
        }

        let replaced = registry.insert(
            subscriber_id,
            Subscription {
                sink,
                generation,
                opened_at: now,
                last_activity: now,
            },
        );
        drop(registry);

        if let Some(old) = replaced {
            debug!(
                subscriber_id,
                old_generation = old.generation,
                open_for_ms = now.duration_since(old.opened_at).as_millis() as u64,
                "Replaced existing progress subscription"
            );
        }
        info!(subscriber_id, generation, "Progress subscription opened");

        Ok(SubscriptionHandle {
            subscriber_id,
            generation,
        })
    }

    /// Open a channel-backed subscription (used by the SSE endpoint)
    ///
    /// Dropping the returned channel unregisters it unless it was already
    /// replaced.
    pub fn subscribe(
        self: &Arc<Self>,
        authenticated_id: SubscriberId,
        subscriber_id: SubscriberId,
    ) -> Result<ProgressChannel, HubError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.register(authenticated_id, subscriber_id, Box::new(ChannelSink::new(tx)))?;

        Ok(ProgressChannel {
            handle,
            receiver: rx,
            _guard: SubscriptionGuard {
                hub: Arc::downgrade(self),
                handle,
            },
        })
    }

    /// Deliver an event to the subscriber's current channel, if any
    pub fn publish(&self, subscriber_id: SubscriberId, kind: ProgressEventKind, payload: impl Into<String>) {
        let event = ProgressEvent::new(subscriber_id, kind, payload);
        let now = Instant::now();
        let mut registry = self.registry();

        let Some(subscription) = registry.get_mut(&subscriber_id) else {
            debug!(subscriber_id, event_type = kind.event_type(), "No progress subscriber, event dropped");
            return;
        };

        if subscription.is_idle(now, self.idle_timeout) {
            registry.remove(&subscriber_id);
            info!(subscriber_id, "Progress subscription idle timeout, closed");
            return;
        }

        match subscription.sink.send(&event) {
            Ok(()) => {
                subscription.last_activity = now;
            }
            Err(e) => {
                let generation = subscription.generation;
                registry.remove(&subscriber_id);
                debug!(subscriber_id, generation, error = %e, "Progress send failed, subscription removed");
            }
        }
    }

    pub fn status(&self, subscriber_id: SubscriberId, payload: impl Into<String>) {
        self.publish(subscriber_id, ProgressEventKind::Status, payload)
    }

    pub fn error(&self, subscriber_id: SubscriberId, payload: impl Into<String>) {
        self.publish(subscriber_id, ProgressEventKind::Error, payload)
    }

    pub fn complete_event(&self, subscriber_id: SubscriberId, payload: impl Into<String>) {
        self.publish(subscriber_id, ProgressEventKind::Complete, payload)
    }

    /// Explicitly close a subscriber's channel
    pub fn complete(&self, subscriber_id: SubscriberId) -> bool {
        let removed = self.registry().remove(&subscriber_id).is_some();
        if removed {
            info!(subscriber_id, "Progress subscription completed");
        }
        removed
    }

    /// Close every subscription; each channel's stream then ends
    ///
    /// Used on shutdown, since open streams never finish on their own.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut registry = self.registry();
            let closed = registry.len();
            registry.clear();
            closed
        };
        if closed > 0 {
            info!(closed, "Closed all progress subscriptions");
        }
        closed
    }

    /// Remove a subscription only if it is still the given generation
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut registry = self.registry();
        match registry.get(&handle.subscriber_id) {
            Some(current) if current.generation == handle.generation => {
                registry.remove(&handle.subscriber_id);
                debug!(
                    subscriber_id = handle.subscriber_id,
                    generation = handle.generation,
                    "Progress subscription closed by client"
                );
                true
            }
            _ => false,
        }
    }

    /// Close every subscription idle for longer than the timeout
    pub fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|_, s| !s.is_idle(now, idle_timeout));
        let reaped = before - registry.len();
        if reaped > 0 {
            info!(reaped, "Closed idle progress subscriptions");
        }
        reaped
    }

    pub fn is_subscribed(&self, subscriber_id: SubscriberId) -> bool {
        self.registry().contains_key(&subscriber_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }
}

/// Run [`ProgressHub::reap_idle`] periodically until cancelled
pub fn spawn_idle_reaper(hub: Arc<ProgressHub>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Progress reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    hub.reap_idle();
                }
            }
        }
    })
}

/// Unregisters its subscription generation on drop
struct SubscriptionGuard {
    hub: Weak<ProgressHub>,
    handle: SubscriptionHandle,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.handle);
        }
    }
}

/// Receiving end of a channel-backed subscription
pub struct ProgressChannel {
    handle: SubscriptionHandle,
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
    _guard: SubscriptionGuard,
}

impl ProgressChannel {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Next event; `None` once the subscription was replaced or removed
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, used by tests and draining loops
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }
}
