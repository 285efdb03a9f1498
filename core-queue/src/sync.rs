//! # Queue Sync
//!
//! Keeps the queue in step with what the player is doing, and builds new
//! queues from playlists.
//!
//! ## Advancement
//!
//! Every playback state update records progress for the reported track and
//! moves the current index to it when the player was driven elsewhere.
//! Once the current track is within [`NEAR_END_THRESHOLD_MS`] of its end the
//! queue advances and the next entry is started. Repeated near-end updates
//! for the same track advance only once. The whole decision is taken under
//! the queue lock, before anything is persisted.
//!
//! ## Building from a playlist
//!
//! The queue is first built from the part of the playlist already loaded, so
//! playback starts immediately. The full playlist is then fetched and the
//! queue rebuilt from it, unless a newer build started in the meantime.

use crate::error::{QueueError, Result};
use crate::model::{find_track_index, QueueTrack};
use crate::store::{Followed, QueueStore};
use async_trait::async_trait;
use core_library::{NormalizedTrack, UserLibrary};
use core_playback::{ListenerHandle, PlaybackCoordinator, PlaybackState, StateListener};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How close to the end a track counts as finished.
pub const NEAR_END_THRESHOLD_MS: u64 = 1200;

pub fn is_near_end(state: &PlaybackState) -> bool {
    state.duration_ms > 0 && state.position_ms + NEAR_END_THRESHOLD_MS >= state.duration_ms
}

// ============================================================================
// Seams
// ============================================================================

/// The playback operations the queue drives.
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn initialize(&self) -> core_playback::Result<()>;

    async fn play_track(&self, uri: &str) -> core_playback::Result<()>;

    fn on_state_change(&self, listener: StateListener) -> ListenerHandle;
}

#[async_trait]
impl PlaybackControl for PlaybackCoordinator {
    async fn initialize(&self) -> core_playback::Result<()> {
        PlaybackCoordinator::initialize(self).await
    }

    async fn play_track(&self, uri: &str) -> core_playback::Result<()> {
        PlaybackCoordinator::play_track(self, uri).await
    }

    fn on_state_change(&self, listener: StateListener) -> ListenerHandle {
        PlaybackCoordinator::on_state_change(self, listener)
    }
}

/// Where playlist tracks come from.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Tracks already loaded for `playlist_id`, without fetching.
    async fn loaded_tracks(&self, playlist_id: &str) -> Vec<NormalizedTrack>;

    /// Every track of `playlist_id`, fetching the remaining pages.
    async fn load_all_tracks(&self, playlist_id: &str) -> Vec<NormalizedTrack>;
}

#[async_trait]
impl PlaylistSource for UserLibrary {
    async fn loaded_tracks(&self, playlist_id: &str) -> Vec<NormalizedTrack> {
        self.playlist_tracks_state(playlist_id).await.items
    }

    async fn load_all_tracks(&self, playlist_id: &str) -> Vec<NormalizedTrack> {
        self.load_all_playlist_tracks(playlist_id).await
    }
}

// ============================================================================
// Queue Sync
// ============================================================================

/// Result of [`QueueSync::replace_queue_from_playlist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The queue was built from the loaded tracks.
    Built {
        /// Length after the initial build
        initial_length: usize,
        /// Length after the rebuild from the full playlist; `None` when a
        /// newer build superseded this one or the track was not found again
        full_length: Option<usize>,
    },
    /// The selected track is not among the loaded tracks; nothing changed.
    TrackNotFound,
    /// The queue is read-only; nothing changed.
    ReadOnly,
}

struct Attachment {
    subscription: ListenerHandle,
    task: JoinHandle<()>,
}

struct Inner {
    queue: Arc<QueueStore>,
    playback: Arc<dyn PlaybackControl>,
    playlists: Arc<dyn PlaylistSource>,
    /// Track that most recently triggered an advance.
    last_ended_track_id: Mutex<Option<String>>,
    build_generation: AtomicU64,
    attachment: Mutex<Option<Attachment>>,
}

#[derive(Clone)]
pub struct QueueSync {
    inner: Arc<Inner>,
}

impl QueueSync {
    pub fn new(
        queue: Arc<QueueStore>,
        playback: Arc<dyn PlaybackControl>,
        playlists: Arc<dyn PlaylistSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                playback,
                playlists,
                last_ended_track_id: Mutex::new(None),
                build_generation: AtomicU64::new(0),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.inner.queue
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attachment.lock().is_some()
    }

    /// Start following playback state. Calling it again does nothing.
    ///
    /// States are applied in delivery order by a background task, so this
    /// must run inside a Tokio runtime.
    pub fn attach(&self) {
        let mut attachment = self.inner.attachment.lock();
        if attachment.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<PlaybackState>();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(state) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_playback_state(&state).await;
            }
            debug!("Playback state stream ended");
        });

        let listener: StateListener = Arc::new(move |state: &PlaybackState| {
            let _ = tx.send(state.clone());
        });
        let subscription = self.inner.playback.on_state_change(listener);

        info!("Queue sync attached to playback");
        *attachment = Some(Attachment { subscription, task });
    }

    /// Stop following playback state.
    pub fn detach(&self) {
        let attachment = self.inner.attachment.lock().take();
        if let Some(Attachment { subscription, task }) = attachment {
            subscription.unsubscribe();
            task.abort();
            info!("Queue sync detached from playback");
        }
    }

    /// Apply one playback state update.
    pub async fn handle_playback_state(&self, state: &PlaybackState) {
        self.inner.handle_playback_state(state).await;
    }

    /// Build the queue from `playlist_id`, starting at `selected_track_id`.
    ///
    /// `selected_track_id` may be a track id or uri.
    #[instrument(skip(self))]
    pub async fn replace_queue_from_playlist(
        &self,
        playlist_id: &str,
        selected_track_id: &str,
    ) -> Result<BuildOutcome> {
        self.attach();
        let inner = &self.inner;

        if inner.queue.is_read_only() {
            inner.queue.reject_read_only("replace_queue_from_playlist");
            return Ok(BuildOutcome::ReadOnly);
        }

        if let Err(e) = inner.playback.initialize().await {
            warn!(error = %e, "Playback initialize failed");
        }

        let loaded = inner.playlists.loaded_tracks(playlist_id).await;
        let Some(start) = find_track_index(&loaded, selected_track_id) else {
            let err = QueueError::TrackNotFound {
                playlist_id: playlist_id.to_string(),
                track_id: selected_track_id.to_string(),
            };
            info!(error = %err, loaded = loaded.len(), "Queue not built");
            return Ok(BuildOutcome::TrackNotFound);
        };

        let initial_length = loaded.len() - start;
        inner.queue.replace_queue(tail(&loaded, start), 0).await;
        *inner.last_ended_track_id.lock() = None;

        match loaded[start].uri.as_deref() {
            Some(uri) => {
                if let Err(e) = inner.playback.play_track(uri).await {
                    warn!(error = %e, uri, "Failed to start selected track");
                }
            }
            None => info!(track_id = %loaded[start].id, "Selected track has no uri"),
        }

        let generation = inner.build_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let full = inner.playlists.load_all_tracks(playlist_id).await;

        if inner.build_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Full playlist load superseded");
            return Ok(BuildOutcome::Built {
                initial_length,
                full_length: None,
            });
        }

        let full_length = match find_track_index(&full, selected_track_id) {
            Some(full_start) => {
                inner.queue.replace_queue(tail(&full, full_start), 0).await;
                Some(full.len() - full_start)
            }
            None => {
                warn!(
                    track_id = selected_track_id,
                    "Selected track missing from full playlist"
                );
                None
            }
        };

        Ok(BuildOutcome::Built {
            initial_length,
            full_length,
        })
    }
}

fn tail(tracks: &[NormalizedTrack], start: usize) -> Vec<QueueTrack> {
    tracks[start..].iter().map(QueueTrack::from).collect()
}

impl Inner {
    async fn handle_playback_state(&self, state: &PlaybackState) {
        let Some(track_id) = state.track_id() else {
            return;
        };

        let followed = self
            .queue
            .follow_playback(
                track_id,
                state.position_ms,
                is_near_end(state),
                &self.last_ended_track_id,
            )
            .await;

        match followed {
            Followed::Advanced(Some(QueueTrack { uri: Some(uri), .. })) => {
                if let Err(e) = self.playback.play_track(&uri).await {
                    warn!(error = %e, uri = %uri, "Failed to start next track");
                }
            }
            Followed::Advanced(Some(next)) => info!(track_id = %next.id, "Next track has no uri"),
            Followed::Advanced(None) => debug!("Queue finished"),
            Followed::Ignored | Followed::Tracked => {}
        }
    }
}
