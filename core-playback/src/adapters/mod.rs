//! Platform playback adapters and their dispatch table

pub mod spotify;
pub mod unavailable;

use crate::traits::PlaybackAdapter;
use core_runtime::Platform;
use std::collections::HashMap;
use std::sync::Arc;

pub use spotify::{SdkEvent, SdkPlayerState, SpotifyPlaybackAdapter, SpotifyPlayer, SpotifySdk};
pub use unavailable::UnavailablePlaybackAdapter;

/// Maps each platform to its playback adapter.
///
/// Platforms without a registered adapter resolve to
/// [`UnavailablePlaybackAdapter`].
#[derive(Clone, Default)]
pub struct PlaybackAdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlaybackAdapter>>,
}

impl PlaybackAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Register an adapter under the platform it reports.
    pub fn register(&mut self, adapter: Arc<dyn PlaybackAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn resolve(&self, platform: Platform) -> Arc<dyn PlaybackAdapter> {
        self.adapters
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| Arc::new(UnavailablePlaybackAdapter::new(platform)))
    }
}
