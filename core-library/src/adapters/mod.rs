//! Per-platform library adapters
//!
//! Each capability (playlists, liked tracks, search) has its own trait.
//! [`LibraryAdapterRegistry`] maps a [`Platform`] to the adapters implementing
//! it; platforms without a registered implementation resolve to
//! [`UnavailableAdapter`], whose every call fails with a fixed message.

pub mod spotify;
pub mod tidal;
pub mod unavailable;

use crate::error::Result;
use crate::models::{NormalizedPlaylist, NormalizedTrack};
use crate::pagination::{Page, PageRequest};
use async_trait::async_trait;
use core_runtime::Platform;
use std::collections::HashMap;
use std::sync::Arc;

pub use spotify::{SpotifyLibraryAdapter, SpotifyLikesAdapter, SpotifySearchAdapter, SpotifyWebApi};
pub use tidal::{TidalLibraryAdapter, TidalLikesAdapter, TidalSearchAdapter, TidalWebApi};
pub use unavailable::UnavailableAdapter;

/// Cover shown when a platform returns no image
pub const DEFAULT_COVER: &str = "/images/test/pl-cover.png";

pub(crate) const UNKNOWN_ARTIST: &str = "Unknown artist";

pub(crate) fn format_track_count(total: u32) -> String {
    if total == 1 {
        "1 song".to_string()
    } else {
        format!("{} songs", total)
    }
}

/// Error body worth showing to a user: plain text only, never a JSON document.
pub(crate) fn readable_body(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        Err(_) => Some(text.to_string()),
    }
}

/// Playlist listing for one platform.
#[async_trait]
pub trait LibraryAdapter: Send + Sync {
    async fn playlists(&self, request: PageRequest) -> Result<Page<NormalizedPlaylist>>;

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        request: PageRequest,
    ) -> Result<Page<NormalizedTrack>>;
}

/// The user's liked tracks on one platform.
#[async_trait]
pub trait LikesAdapter: Send + Sync {
    async fn liked_tracks(&self, request: PageRequest) -> Result<Page<NormalizedTrack>>;
}

/// Track search on one platform.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    async fn search_tracks(&self, query: &str, request: PageRequest)
        -> Result<Page<NormalizedTrack>>;
}

/// The adapters backing one platform.
#[derive(Clone)]
pub struct AdapterSet {
    pub library: Arc<dyn LibraryAdapter>,
    pub likes: Arc<dyn LikesAdapter>,
    pub search: Arc<dyn SearchAdapter>,
}

impl AdapterSet {
    /// Every capability fails with the platform's "not available yet" message.
    pub fn unavailable(platform: Platform) -> Self {
        let adapter = Arc::new(UnavailableAdapter::new(platform));
        Self {
            library: adapter.clone(),
            likes: adapter.clone(),
            search: adapter,
        }
    }

    /// Spotify Web API adapters sharing one client.
    pub fn spotify(api: SpotifyWebApi) -> Self {
        Self {
            library: Arc::new(SpotifyLibraryAdapter::new(api.clone())),
            likes: Arc::new(SpotifyLikesAdapter::new(api.clone())),
            search: Arc::new(SpotifySearchAdapter::new(api)),
        }
    }

    /// TIDAL Open API adapters sharing one client.
    pub fn tidal(api: TidalWebApi) -> Self {
        Self {
            library: Arc::new(TidalLibraryAdapter::new(api.clone())),
            likes: Arc::new(TidalLikesAdapter::new(api.clone())),
            search: Arc::new(TidalSearchAdapter::new(api)),
        }
    }
}

/// Platform to adapter dispatch table.
#[derive(Clone, Default)]
pub struct LibraryAdapterRegistry {
    adapters: HashMap<Platform, AdapterSet>,
}

impl LibraryAdapterRegistry {
    /// A registry where every platform is unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spotify backed by its Web API, the rest unavailable.
    pub fn with_spotify(api: SpotifyWebApi) -> Self {
        let mut registry = Self::new();
        registry.register(Platform::Spotify, AdapterSet::spotify(api));
        registry
    }

    /// Add TIDAL backed by its Open API.
    pub fn with_tidal(mut self, api: TidalWebApi) -> Self {
        self.register(Platform::Tidal, AdapterSet::tidal(api));
        self
    }

    pub fn register(&mut self, platform: Platform, adapters: AdapterSet) {
        self.adapters.insert(platform, adapters);
    }

    pub fn adapters(&self, platform: Platform) -> AdapterSet {
        self.adapters
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| AdapterSet::unavailable(platform))
    }

    pub fn library(&self, platform: Platform) -> Arc<dyn LibraryAdapter> {
        self.adapters(platform).library
    }

    pub fn likes(&self, platform: Platform) -> Arc<dyn LikesAdapter> {
        self.adapters(platform).likes
    }

    pub fn search(&self, platform: Platform) -> Arc<dyn SearchAdapter> {
        self.adapters(platform).search
    }
}
