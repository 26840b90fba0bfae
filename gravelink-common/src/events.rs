//! Lifecycle events for the memorial resolution pipeline
//!
//! The pipeline reports progress through a typed event stream instead of
//! callbacks. A presentation layer subscribes to the [`EventBus`] and reacts to
//! [`ResolverEvent`]s without polling.

use crate::models::MemorialRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Resolution pipeline events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    /// Work started for a memorial
    ///
    /// Triggers:
    /// - UI: show a "searching" indicator on the memorial's link
    UpdateStarted {
        memorial_id: String,
    },

    /// A memorial's cached state changed and was persisted
    ///
    /// Triggers:
    /// - UI: re-render the memorial's link from `record`
    DataChanged {
        memorial_id: String,
        record: MemorialRecord,
    },

    /// Work finished for a memorial (successfully or not)
    UpdateEnded {
        memorial_id: String,
    },

    /// A lookup failed; the memorial stays unresolved and is retried on its
    /// next sighting
    ///
    /// Triggers:
    /// - UI: toast with `message`
    ResolutionFailed {
        memorial_id: String,
        message: String,
    },

    /// Person lookups are pending but no authenticated session exists
    ///
    /// Triggers:
    /// - UI: "sign in" banner
    AuthenticationRequired {
        pending: usize,
    },
}

impl ResolverEvent {
    /// Memorial the event refers to, if any
    pub fn memorial_id(&self) -> Option<&str> {
        match self {
            ResolverEvent::UpdateStarted { memorial_id }
            | ResolverEvent::DataChanged { memorial_id, .. }
            | ResolverEvent::UpdateEnded { memorial_id }
            | ResolverEvent::ResolutionFailed { memorial_id, .. } => Some(memorial_id),
            ResolverEvent::AuthenticationRequired { .. } => None,
        }
    }
}

/// Event distribution bus
///
/// Uses `tokio::sync::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block the workers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use gravelink_common::events::{EventBus, ResolverEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ResolverEvent::UpdateStarted {
///     memorial_id: "123".to_string(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(ResolverEvent::UpdateStarted { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResolverEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ResolverEvent,
    ) -> Result<usize, broadcast::error::SendError<ResolverEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ResolverEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
