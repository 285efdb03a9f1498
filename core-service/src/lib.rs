//! Core service context and bootstrap.
//!
//! [`CoreService`] wires host-provided bridges (settings storage, HTTP and
//! the Spotify playback SDK) into the platform selectors, the playback
//! coordinator, the library page caches and the play queue. Desktop apps
//! typically enable the `desktop-shims` feature, which supplies default
//! bridges from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::time::{Clock, SystemClock};
use core_library::{
    LibraryAdapterRegistry, SpotifyWebApi, TidalWebApi, UserLibrary, UserLibraryLikes,
    UserLibrarySearch,
};
use core_playback::{
    PlaybackAdapterRegistry, PlaybackCoordinator, SpotifyPlaybackAdapter, SpotifySdk,
};
use core_queue::{QueueStore, QueueSync};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_runtime::{PlatformSelector, ResolverScope};
use tracing::info;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    playback_selector: PlatformSelector,
    library_selector: PlatformSelector,
    playback: Arc<PlaybackCoordinator>,
    library: Arc<UserLibrary>,
    likes: Arc<UserLibraryLikes>,
    search: Arc<UserLibrarySearch>,
    queue: Arc<QueueStore>,
    queue_sync: QueueSync,
}

impl CoreService {
    /// Build every component from `config`.
    ///
    /// The Spotify playback SDK lives in the host shell; without one the
    /// service cannot be built.
    pub async fn new(
        config: CoreConfig,
        spotify_sdk: Option<Arc<dyn SpotifySdk>>,
    ) -> Result<Self> {
        Self::with_clock(config, spotify_sdk, Arc::new(SystemClock)).await
    }

    /// Like [`CoreService::new`], with an explicit clock for queue timestamps.
    pub async fn with_clock(
        config: CoreConfig,
        spotify_sdk: Option<Arc<dyn SpotifySdk>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let sdk = spotify_sdk.ok_or_else(|| CoreError::CapabilityMissing {
            capability: "SpotifySdk".to_string(),
            message: "A Spotify playback SDK implementation is required to create the \
                     Spotify player. Inject the host's Web Playback SDK bridge."
                .to_string(),
        })?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let store = config.settings_store.clone();
        let http = config.http_client.clone();

        let playback_selector = PlatformSelector::new(
            ResolverScope::Playback,
            config.platform_overrides.clone(),
            store.clone(),
        );
        let library_selector = PlatformSelector::new(
            ResolverScope::Library,
            config.platform_overrides.clone(),
            store.clone(),
        );

        let spotify_playback = SpotifyPlaybackAdapter::new(
            sdk,
            http.clone(),
            store.clone(),
            config.spotify_api_base.clone(),
            config.player_name.clone(),
        );
        let playback_registry =
            PlaybackAdapterRegistry::new().with_adapter(Arc::new(spotify_playback));
        let playback = Arc::new(PlaybackCoordinator::with_event_bus(
            playback_selector.clone(),
            Arc::new(playback_registry),
            event_bus.clone(),
        ));

        let spotify_api =
            SpotifyWebApi::new(http.clone(), store.clone(), config.spotify_api_base.clone());
        let tidal_api = TidalWebApi::new(http, store.clone(), config.tidal_api_base.clone());
        let library_registry = Arc::new(
            LibraryAdapterRegistry::with_spotify(spotify_api).with_tidal(tidal_api),
        );
        let library = Arc::new(
            UserLibrary::new(library_selector.clone(), library_registry.clone())
                .with_event_bus(event_bus.clone()),
        );
        let likes = Arc::new(
            UserLibraryLikes::new(library_selector.clone(), library_registry.clone())
                .with_event_bus(event_bus.clone()),
        );
        let search = Arc::new(
            UserLibrarySearch::new(library_selector.clone(), library_registry)
                .with_event_bus(event_bus.clone()),
        );

        let queue = Arc::new(
            QueueStore::load(store, clock)
                .await
                .with_event_bus(event_bus.clone()),
        );
        let queue_sync = QueueSync::new(queue.clone(), playback.clone(), library.clone());

        info!(
            api_base = %config.spotify_api_base,
            player_name = %config.player_name,
            "Core service ready"
        );

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            playback_selector,
            library_selector,
            playback,
            library,
            likes,
            search,
            queue,
            queue_sync,
        })
    }

    /// Start following playback with the queue.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(&self) {
        self.queue_sync.attach();
    }

    /// Stop following playback and tear the player down.
    pub async fn shutdown(&self) -> Result<()> {
        self.queue_sync.detach();
        self.playback.destroy().await?;
        info!("Core service shut down");
        Ok(())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn playback_selector(&self) -> &PlatformSelector {
        &self.playback_selector
    }

    pub fn library_selector(&self) -> &PlatformSelector {
        &self.library_selector
    }

    pub fn playback(&self) -> &Arc<PlaybackCoordinator> {
        &self.playback
    }

    pub fn library(&self) -> &Arc<UserLibrary> {
        &self.library
    }

    pub fn likes(&self) -> &Arc<UserLibraryLikes> {
        &self.likes
    }

    pub fn search(&self) -> &Arc<UserLibrarySearch> {
        &self.search
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.queue
    }

    pub fn queue_sync(&self) -> &QueueSync {
        &self.queue_sync
    }
}
