//! Track search over the active platform
//!
//! Results accumulate for the current query only. Changing the query, or
//! the resolved platform, starts over from the first page.

use crate::adapters::LibraryAdapterRegistry;
use crate::cache::PageCache;
use crate::library::PlatformTracker;
use crate::models::NormalizedTrack;
use crate::pagination::{PageState, SEARCH_PAGE_SIZE};
use core_runtime::events::EventBus;
use core_runtime::{Platform, PlatformSelector};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

const DEFAULT_ERROR: &str = "Unexpected error while searching your library.";

/// Search results together with the query that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    #[serde(flatten)]
    pub state: PageState<NormalizedTrack>,
}

pub struct UserLibrarySearch {
    tracker: PlatformTracker,
    registry: Arc<LibraryAdapterRegistry>,
    query: Mutex<String>,
    cache: PageCache<NormalizedTrack>,
}

impl UserLibrarySearch {
    pub fn new(selector: PlatformSelector, registry: Arc<LibraryAdapterRegistry>) -> Self {
        Self {
            tracker: PlatformTracker::new("search", selector),
            registry,
            query: Mutex::new(String::new()),
            cache: PageCache::new("search", SEARCH_PAGE_SIZE, DEFAULT_ERROR),
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
        self.tracker.ensure(|| self.reset()).await
    }

    fn snapshot(&self) -> SearchState {
        let query = self.query.lock().clone();
        let state = self.cache.state(&query);
        SearchState { query, state }
    }

    pub async fn state(&self) -> SearchState {
        self.ensure_platform().await;
        self.snapshot()
    }

    /// Run `query` and load its first page.
    ///
    /// A blank query clears the results. Repeating the current query loads
    /// its next page instead of starting over.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> SearchState {
        self.ensure_platform().await;

        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.reset();
            return self.snapshot();
        }

        {
            let mut current = self.query.lock();
            if *current != trimmed {
                debug!(query = trimmed, "New search query");
                self.cache.reset_all();
                *current = trimmed.to_string();
            }
        }

        self.load_next_page().await
    }

    #[instrument(skip(self))]
    pub async fn load_next_page(&self) -> SearchState {
        let platform = self.ensure_platform().await;

        let query = self.query.lock().clone();
        if query.is_empty() {
            return self.snapshot();
        }

        let adapter = self.registry.search(platform);
        let state = self
            .cache
            .load_next_page(&query, |request| adapter.search_tracks(&query, request))
            .await;
        SearchState { query, state }
    }

    /// Clear the query and every loaded result.
    pub fn reset(&self) {
        self.query.lock().clear();
        self.cache.reset_all();
    }
}
