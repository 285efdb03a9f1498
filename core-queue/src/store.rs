//! # Queue Store
//!
//! Owns the session [`Queue`]. Every operation follows the same shape:
//! check the mode, mutate under the lock, emit an event, then persist the
//! whole queue once.
//!
//! In guest mode every mutation except [`QueueStore::apply_snapshot`] is a
//! logged no-op.

use crate::model::{Queue, QueueMode, QueueSnapshot, QueueTrack};
use bridge_traits::storage::SettingsStore;
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use core_runtime::platform::keys;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stored queue as read back; any field may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredQueue {
    mode: Option<QueueMode>,
    items: Option<Vec<QueueTrack>>,
    current_index: Option<usize>,
    updated_at: Option<i64>,
    last_played_track_id: Option<String>,
    last_played_position_ms: Option<u64>,
    last_played_at: Option<i64>,
}

impl StoredQueue {
    fn into_queue(self, now: i64) -> Queue {
        let items = self.items.unwrap_or_default();
        let current_index = self
            .current_index
            .unwrap_or(0)
            .min(items.len().saturating_sub(1));
        Queue {
            mode: self.mode.unwrap_or_default(),
            items,
            current_index,
            updated_at: self.updated_at.unwrap_or(now),
            last_played_track_id: self.last_played_track_id,
            last_played_position_ms: self.last_played_position_ms.unwrap_or(0),
            last_played_at: self.last_played_at.unwrap_or(now),
        }
    }
}

/// Outcome of applying one playback update to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followed {
    /// The queue is read-only; nothing was recorded.
    Ignored,
    /// Progress was recorded and the position resynced if needed.
    Tracked,
    /// The current track ended; carries the new current entry, if any.
    Advanced(Option<QueueTrack>),
}

/// Take the advance for `track_id` unless it already triggered one.
fn claim(last_ended: &Mutex<Option<String>>, track_id: &str) -> bool {
    let mut last = last_ended.lock();
    if last.as_deref() == Some(track_id) {
        return false;
    }
    *last = Some(track_id.to_string());
    true
}

pub struct QueueStore {
    queue: Mutex<Queue>,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    /// Serializes writes so the last write always carries the newest queue.
    persist_lock: tokio::sync::Mutex<()>,
    event_bus: Option<EventBus>,
}

impl QueueStore {
    /// Restore the queue saved by a previous session, or start empty.
    #[instrument(skip_all)]
    pub async fn load(settings: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.unix_timestamp_millis();
        let queue = match settings.get_string(keys::QUEUE_STATE).await {
            Ok(Some(raw)) => match serde_json::from_str::<StoredQueue>(&raw) {
                Ok(stored) => {
                    let queue = stored.into_queue(now);
                    info!(
                        length = queue.len(),
                        mode = ?queue.mode,
                        "Restored persisted queue"
                    );
                    queue
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable persisted queue");
                    Queue::new(now)
                }
            },
            Ok(None) => Queue::new(now),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted queue");
                Queue::new(now)
            }
        };

        Self {
            queue: Mutex::new(queue),
            settings,
            clock,
            persist_lock: tokio::sync::Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Copy of the whole queue.
    pub fn queue(&self) -> Queue {
        self.queue.lock().clone()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.lock().snapshot()
    }

    pub fn mode(&self) -> QueueMode {
        self.queue.lock().mode
    }

    pub fn is_read_only(&self) -> bool {
        self.queue.lock().is_read_only()
    }

    pub fn items(&self) -> Vec<QueueTrack> {
        self.queue.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.queue.lock().current_index
    }

    pub fn current_track(&self) -> Option<QueueTrack> {
        self.queue.lock().current_track().cloned()
    }

    pub fn upcoming(&self) -> Vec<QueueTrack> {
        self.queue.lock().upcoming().to_vec()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Replace the queue and start at `start_index` (clamped).
    #[instrument(skip(self, tracks), fields(length = tracks.len()))]
    pub async fn replace_queue(&self, tracks: Vec<QueueTrack>, start_index: usize) {
        let now = self.clock.unix_timestamp_millis();
        let event = {
            let mut queue = self.queue.lock();
            if queue.is_read_only() {
                None
            } else {
                queue.replace(tracks, start_index, now);
                Some(QueueEvent::Replaced {
                    length: queue.len(),
                    current_index: queue.current_index,
                })
            }
        };
        self.commit("replace_queue", event).await;
    }

    /// Append `tracks` after the last entry; the current index is kept.
    #[instrument(skip(self, tracks), fields(added = tracks.len()))]
    pub async fn append_tracks(&self, tracks: Vec<QueueTrack>) {
        let now = self.clock.unix_timestamp_millis();
        let event = {
            let mut queue = self.queue.lock();
            if queue.is_read_only() {
                None
            } else if tracks.is_empty() {
                return;
            } else {
                let added = tracks.len();
                queue.append(tracks, now);
                Some(QueueEvent::Appended {
                    added,
                    length: queue.len(),
                })
            }
        };
        self.commit("append_tracks", event).await;
    }

    /// Drop the current entry and everything before it.
    ///
    /// Advancing from the last entry leaves the queue empty.
    #[instrument(skip(self))]
    pub async fn advance(&self) {
        let now = self.clock.unix_timestamp_millis();
        let event = {
            let mut queue = self.queue.lock();
            if queue.is_read_only() {
                None
            } else if queue.is_empty() {
                return;
            } else {
                queue.advance(now);
                Some(match queue.current_track() {
                    Some(track) => QueueEvent::Advanced {
                        length: queue.len(),
                        current_track_id: Some(track.id.clone()),
                    },
                    None => QueueEvent::Cleared,
                })
            }
        };
        self.commit("advance", event).await;
    }

    #[instrument(skip(self))]
    pub async fn set_current_index(&self, index: usize) {
        let now = self.clock.unix_timestamp_millis();
        let event = {
            let mut queue = self.queue.lock();
            if queue.is_read_only() {
                None
            } else {
                queue.set_current_index(index, now);
                Some(QueueEvent::IndexChanged {
                    current_index: queue.current_index,
                    track_id: queue.last_played_track_id.clone(),
                })
            }
        };
        self.commit("set_current_index", event).await;
    }

    /// Record resume bookkeeping; items and index are untouched.
    pub async fn set_playback_progress(&self, track_id: &str, position_ms: u64) {
        let now = self.clock.unix_timestamp_millis();
        {
            let mut queue = self.queue.lock();
            if queue.is_read_only() {
                debug!(track_id, "Progress not recorded (read-only)");
                return;
            }
            queue.record_progress(track_id, position_ms, now);
        }
        self.persist().await;
    }

    /// Mirror a shared queue. Allowed in any mode; switches to guest.
    #[instrument(skip(self, snapshot), fields(length = snapshot.items.len()))]
    pub async fn apply_snapshot(&self, snapshot: QueueSnapshot) {
        let now = self.clock.unix_timestamp_millis();
        let event = {
            let mut queue = self.queue.lock();
            queue.apply_snapshot(snapshot, now);
            QueueEvent::SnapshotApplied {
                length: queue.len(),
                current_index: queue.current_index,
            }
        };
        self.commit("apply_snapshot", Some(event)).await;
    }

    /// Switch between host and guest without touching the items.
    pub async fn set_mode(&self, mode: QueueMode) {
        let now = self.clock.unix_timestamp_millis();
        {
            let mut queue = self.queue.lock();
            if queue.mode == mode {
                return;
            }
            queue.mode = mode;
            queue.updated_at = now;
        }
        info!(mode = ?mode, "Queue mode changed");
        self.emit(QueueEvent::ModeChanged {
            read_only: mode == QueueMode::Guest,
        });
        self.persist().await;
    }

    /// Apply one playback update as a single step.
    ///
    /// Records progress for `track_id`, moves the current index to it when
    /// the player was driven elsewhere, and advances once when the current
    /// track is `near_end`. `last_ended` holds the track that last triggered
    /// an advance and is claimed under the queue lock.
    pub(crate) async fn follow_playback(
        &self,
        track_id: &str,
        position_ms: u64,
        near_end: bool,
        last_ended: &Mutex<Option<String>>,
    ) -> Followed {
        let now = self.clock.unix_timestamp_millis();
        let mut events = Vec::new();
        let followed = {
            let mut queue = self.queue.lock();
            if queue.is_read_only() {
                debug!(track_id, "Progress not recorded (read-only)");
                return Followed::Ignored;
            }

            let current_index = queue.current_index;
            let matched = queue.position_of(track_id);
            queue.record_progress(track_id, position_ms, now);

            if let Some(index) = matched.filter(|&index| index != current_index) {
                debug!(track_id, from = current_index, to = index, "Resyncing queue position");
                queue.set_current_index(index, now);
                events.push(QueueEvent::IndexChanged {
                    current_index: queue.current_index,
                    track_id: queue.last_played_track_id.clone(),
                });
            }

            if near_end && matched == Some(current_index) && claim(last_ended, track_id) {
                debug!(track_id, "Track ending, advancing queue");
                queue.advance(now);
                let next = queue.current_track().cloned();
                events.push(match &next {
                    Some(track) => QueueEvent::Advanced {
                        length: queue.len(),
                        current_track_id: Some(track.id.clone()),
                    },
                    None => QueueEvent::Cleared,
                });
                Followed::Advanced(next)
            } else {
                Followed::Tracked
            }
        };

        for event in events {
            self.emit(event);
        }
        self.persist().await;
        followed
    }

    /// Log and announce a mutation skipped because the queue is read-only.
    pub(crate) fn reject_read_only(&self, operation: &str) {
        warn!(operation, "Queue mutation ignored (read-only)");
        self.emit(QueueEvent::ReadOnlyIgnored {
            operation: operation.to_string(),
        });
    }

    async fn commit(&self, operation: &str, event: Option<QueueEvent>) {
        match event {
            Some(event) => {
                debug!(operation, "Queue updated");
                self.emit(event);
                self.persist().await;
            }
            None => self.reject_read_only(operation),
        }
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Queue(event));
        }
    }

    async fn persist(&self) {
        let _write = self.persist_lock.lock().await;
        let encoded = serde_json::to_string(&*self.queue.lock());
        let json = match encoded {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode queue");
                return;
            }
        };
        if let Err(e) = self.settings.set_string(keys::QUEUE_STATE, &json).await {
            warn!(error = %e, "Failed to persist queue");
        }
    }
}
