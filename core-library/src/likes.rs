//! The user's liked tracks

use crate::adapters::LibraryAdapterRegistry;
use crate::cache::PageCache;
use crate::library::PlatformTracker;
use crate::models::NormalizedTrack;
use crate::pagination::{PageState, LIKES_PAGE_SIZE};
use core_runtime::events::EventBus;
use core_runtime::{Platform, PlatformSelector};
use std::sync::Arc;
use tracing::instrument;

const LIKED_KEY: &str = "liked";
const DEFAULT_ERROR: &str = "Unexpected error while loading your liked tracks.";

pub struct UserLibraryLikes {
    tracker: PlatformTracker,
    registry: Arc<LibraryAdapterRegistry>,
    cache: PageCache<NormalizedTrack>,
}

impl UserLibraryLikes {
    pub fn new(selector: PlatformSelector, registry: Arc<LibraryAdapterRegistry>) -> Self {
        Self {
            tracker: PlatformTracker::new("likes", selector),
            registry,
            cache: PageCache::new("likes", LIKES_PAGE_SIZE, DEFAULT_ERROR),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.tracker.set_event_bus(event_bus.clone());
        self.cache = self.cache.with_event_bus(event_bus);
        self
    }

    pub fn platform(&self) -> Option<Platform> {
        self.tracker.current()
    }

    async fn ensure_platform(&self) -> Platform {
        self.tracker.ensure(|| self.cache.reset_all()).await
    }

    pub async fn state(&self) -> PageState<NormalizedTrack> {
        self.ensure_platform().await;
        self.cache.state(LIKED_KEY)
    }

    #[instrument(skip(self))]
    pub async fn load_next_page(&self) -> PageState<NormalizedTrack> {
        let platform = self.ensure_platform().await;
        let adapter = self.registry.likes(platform);
        self.cache
            .load_next_page(LIKED_KEY, |request| adapter.liked_tracks(request))
            .await
    }

    /// Forget every loaded page.
    pub fn reset(&self) {
        self.cache.reset_all();
    }
}
