//! # Event Bus System
//!
//! Provides an event-driven side channel for the player core using
//! `tokio::sync::broadcast`. Components publish what they did; observers
//! (diagnostics, host UI bridges) subscribe without coupling to the
//! components themselves.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ Playback Coord.  ├──────────>│           │
//! └──────────────────┘           │           │   subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │ EventBus  ├──────────────>│ Subscriber │
//! │ Queue Engine     ├──────────>│ (broadcast│               └────────────┘
//! └──────────────────┘           │  channel) │   subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │           ├──────────────>│ Subscriber │
//! │ Library Caches   ├──────────>│           │               └────────────┘
//! └──────────────────┘           └───────────┘
//! ```
//!
//! The bus is not how components coordinate with each other; playback state
//! reaches the queue through listener callbacks. Publishing with no
//! subscribers returns an error that publishers ignore.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Queue(QueueEvent::Cleared))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Queue cleared");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback coordinator events
    Playback(PlaybackEvent),
    /// Queue engine events
    Queue(QueueEvent),
    /// Library page cache events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Library(LibraryEvent::PageFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Queue(QueueEvent::ReadOnlyIgnored { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::AdapterBound { .. })
            | CoreEvent::Playback(PlaybackEvent::Destroyed { .. })
            | CoreEvent::Queue(QueueEvent::Replaced { .. })
            | CoreEvent::Queue(QueueEvent::SnapshotApplied { .. })
            | CoreEvent::Queue(QueueEvent::ModeChanged { .. })
            | CoreEvent::Library(LibraryEvent::PlatformChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events published by the playback coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The coordinator bound its adapter during initialization.
    AdapterBound { platform: Platform },
    /// The bound adapter replaced its playback state.
    StateChanged {
        platform: Platform,
        is_ready: bool,
        is_playing: bool,
        position_ms: u64,
        duration_ms: u64,
        track_id: Option<String>,
    },
    /// The coordinator was destroyed and its state reset.
    Destroyed { platform: Platform },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::AdapterBound { .. } => "Playback adapter bound",
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::Destroyed { .. } => "Playback coordinator destroyed",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events published by the queue engine after a mutation is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The queue contents were replaced.
    Replaced { length: usize, current_index: usize },
    /// Tracks were appended to the end of the queue.
    Appended { added: usize, length: usize },
    /// The queue was consumed forward past its current track.
    Advanced {
        length: usize,
        current_track_id: Option<String>,
    },
    /// Advancing ran past the end; the queue is now empty.
    Cleared,
    /// The current index moved without changing the items.
    IndexChanged {
        current_index: usize,
        track_id: Option<String>,
    },
    /// A shared snapshot was applied and the queue became read-only.
    SnapshotApplied { length: usize, current_index: usize },
    /// A mutation was skipped because the queue is read-only.
    ReadOnlyIgnored { operation: String },
    /// The queue switched between host and guest.
    ModeChanged { read_only: bool },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Replaced { .. } => "Queue replaced",
            QueueEvent::Appended { .. } => "Tracks appended to queue",
            QueueEvent::Advanced { .. } => "Queue advanced",
            QueueEvent::Cleared => "Queue cleared",
            QueueEvent::IndexChanged { .. } => "Queue position changed",
            QueueEvent::SnapshotApplied { .. } => "Queue snapshot applied",
            QueueEvent::ReadOnlyIgnored { .. } => "Queue mutation ignored in guest mode",
            QueueEvent::ModeChanged { .. } => "Queue mode changed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events published by the library page caches.
///
/// `resource` names the cache ("playlists", "playlist_tracks", "likes",
/// "search") and `key` the page state within it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A page was fetched and appended.
    PageLoaded {
        resource: String,
        key: String,
        total_items: usize,
        has_more: bool,
    },
    /// A page fetch failed; the message is stored on the page state.
    PageFailed {
        resource: String,
        key: String,
        message: String,
    },
    /// The resolved platform changed and all accumulated pages were dropped.
    PlatformChanged { resource: String, platform: Platform },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::PageLoaded { .. } => "Library page loaded",
            LibraryEvent::PageFailed { .. } => "Library page failed",
            LibraryEvent::PlatformChanged { .. } => "Library platform changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let queue_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Queue(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn replaced() -> CoreEvent {
        CoreEvent::Queue(QueueEvent::Replaced {
            length: 3,
            current_index: 0,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Queue(QueueEvent::Cleared)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Playback(PlaybackEvent::AdapterBound {
            platform: Platform::Spotify,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Queue(_)));

        bus.emit(CoreEvent::Library(LibraryEvent::PlatformChanged {
            resource: "playlists".to_string(),
            platform: Platform::Deezer,
        }))
        .ok();
        bus.emit(replaced()).ok();

        assert_eq!(stream.recv().await.unwrap(), replaced());
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(replaced()).ok();
        assert_eq!(stream.try_recv().unwrap().unwrap(), replaced());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Queue(QueueEvent::Appended {
                added: 1,
                length: i + 1,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity_and_description() {
        let failed = CoreEvent::Library(LibraryEvent::PageFailed {
            resource: "likes".to_string(),
            key: "liked".to_string(),
            message: "Spotify request failed (500). Please try again later.".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(failed.description(), "Library page failed");

        assert_eq!(replaced().severity(), EventSeverity::Info);

        let tick = CoreEvent::Playback(PlaybackEvent::StateChanged {
            platform: Platform::Spotify,
            is_ready: true,
            is_playing: true,
            position_ms: 5_000,
            duration_ms: 180_000,
            track_id: Some("t1".to_string()),
        });
        assert_eq!(tick.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Queue(QueueEvent::ReadOnlyIgnored {
            operation: "advance".to_string(),
        });

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Queue");
        assert_eq!(json["payload"]["event"], "ReadOnlyIgnored");
        assert_eq!(json["payload"]["operation"], "advance");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
