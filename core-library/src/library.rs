//! User library: playlists and playlist tracks for the active platform

use crate::adapters::LibraryAdapterRegistry;
use crate::cache::PageCache;
use crate::models::{NormalizedPlaylist, NormalizedTrack};
use crate::pagination::{PageState, PLAYLISTS_PAGE_SIZE, TRACKS_PAGE_SIZE};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_runtime::{Platform, PlatformSelector};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument};

/// Key of the single playlists listing
pub const ALL_PLAYLISTS_KEY: &str = "all";

const DEFAULT_ERROR: &str = "Unexpected error while loading your library.";

/// Tracks which platform a facade last served.
///
/// The selector is consulted on every call so credential changes are picked
/// up without explicit invalidation.
pub(crate) struct PlatformTracker {
    resource: &'static str,
    selector: PlatformSelector,
    current: Mutex<Option<Platform>>,
    event_bus: Option<EventBus>,
}

impl PlatformTracker {
    pub(crate) fn new(resource: &'static str, selector: PlatformSelector) -> Self {
        Self {
            resource,
            selector,
            current: Mutex::new(None),
            event_bus: None,
        }
    }

    pub(crate) fn set_event_bus(&mut self, event_bus: EventBus) {
        self.event_bus = Some(event_bus);
    }

    pub(crate) fn current(&self) -> Option<Platform> {
        *self.current.lock()
    }

    /// Resolve the platform; `reset` runs when it differs from the last one.
    pub(crate) async fn ensure(&self, reset: impl FnOnce()) -> Platform {
        let platform = self.selector.resolve().await;

        let previous = self.current.lock().replace(platform);
        if previous != Some(platform) {
            reset();
            if let Some(previous) = previous {
                info!(
                    resource = self.resource,
                    from = %previous,
                    to = %platform,
                    "Library platform changed"
                );
                if let Some(bus) = &self.event_bus {
                    let _ = bus.emit(CoreEvent::Library(LibraryEvent::PlatformChanged {
                        resource: self.resource.to_string(),
                        platform,
                    }));
                }
            }
        }

        platform
    }
}

/// Paginated playlists and per-playlist tracks.
pub struct UserLibrary {
    tracker: PlatformTracker,
    registry: Arc<LibraryAdapterRegistry>,
    playlists: PageCache<NormalizedPlaylist>,
    tracks: PageCache<NormalizedTrack>,
}

impl UserLibrary {
    pub fn new(selector: PlatformSelector, registry: Arc<LibraryAdapterRegistry>) -> Self {
        Self {
            tracker: PlatformTracker::new("library", selector),
            registry,
            playlists: PageCache::new("playlists", PLAYLISTS_PAGE_SIZE, DEFAULT_ERROR),
            tracks: PageCache::new("playlist_tracks", TRACKS_PAGE_SIZE, DEFAULT_ERROR),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.tracker.set_event_bus(event_bus.clone());
        self.playlists = self.playlists.with_event_bus(event_bus.clone());
        self.tracks = self.tracks.with_event_bus(event_bus);
        self
    }

    /// Platform served by the most recent call, if any.
    pub fn platform(&self) -> Option<Platform> {
        self.tracker.current()
    }

    async fn ensure_platform(&self) -> Platform {
        self.tracker
            .ensure(|| {
                self.playlists.reset_all();
                self.tracks.reset_all();
            })
            .await
    }

    pub async fn playlists_state(&self) -> PageState<NormalizedPlaylist> {
        self.ensure_platform().await;
        self.playlists.state(ALL_PLAYLISTS_KEY)
    }

    #[instrument(skip(self))]
    pub async fn load_next_playlists_page(&self) -> PageState<NormalizedPlaylist> {
        let platform = self.ensure_platform().await;
        let adapter = self.registry.library(platform);
        self.playlists
            .load_next_page(ALL_PLAYLISTS_KEY, |request| adapter.playlists(request))
            .await
    }

    pub async fn playlist_tracks_state(&self, playlist_id: &str) -> PageState<NormalizedTrack> {
        self.ensure_platform().await;
        self.tracks.state(playlist_id)
    }

    #[instrument(skip(self))]
    pub async fn load_next_playlist_tracks_page(
        &self,
        playlist_id: &str,
    ) -> PageState<NormalizedTrack> {
        let platform = self.ensure_platform().await;
        let adapter = self.registry.library(platform);
        self.tracks
            .load_next_page(playlist_id, |request| {
                adapter.playlist_tracks(playlist_id, request)
            })
            .await
    }

    /// Page through the whole playlist and return every track loaded.
    #[instrument(skip(self))]
    pub async fn load_all_playlist_tracks(&self, playlist_id: &str) -> Vec<NormalizedTrack> {
        let platform = self.ensure_platform().await;
        let adapter = self.registry.library(platform);
        self.tracks
            .load_all(playlist_id, |request| {
                let adapter = adapter.clone();
                async move { adapter.playlist_tracks(playlist_id, request).await }
            })
            .await
            .items
    }
}
