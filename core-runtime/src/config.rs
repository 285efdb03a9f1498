//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges and settings every component needs.
//! It enforces fail-fast validation so a missing bridge is reported at build
//! time instead of on the first network call.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - queue snapshot, platform preference, credential markers
//! - `HttpClient` - streaming platform Web API calls
//!
//! When the `desktop-shims` feature is enabled, desktop defaults are injected
//! when not provided: a `ReqwestHttpClient`, and a `SqliteSettingsStore` at the
//! path given to [`CoreConfigBuilder::settings_path`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .settings_store(Arc::new(MySettingsStore))
//!     .http_client(Arc::new(MyHttpClient))
//!     .overrides_from_env()
//!     .player_name("Living Room")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::platform::PlatformOverrides;
use bridge_traits::{HttpClient, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Default base URL of the Spotify Web API.
pub const DEFAULT_SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Default base URL of the TIDAL Open API.
pub const DEFAULT_TIDAL_API_BASE: &str = "https://openapi.tidal.com/v2";

/// Device name announced by the Spotify player.
pub const DEFAULT_PLAYER_NAME: &str = "Web Player";

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Durable key-value storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// HTTP client for platform Web APIs (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Explicit platform overrides, highest resolution priority
    pub platform_overrides: PlatformOverrides,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// Base URL of the Spotify Web API, without trailing slash
    pub spotify_api_base: String,

    /// Base URL of the TIDAL Open API, without trailing slash
    pub tidal_api_base: String,

    /// Device name announced to Spotify Connect
    pub player_name: String,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field("http_client", &"HttpClient { ... }")
            .field("platform_overrides", &self.platform_overrides)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("spotify_api_base", &self.spotify_api_base)
            .field("tidal_api_base", &self.tidal_api_base)
            .field("player_name", &self.player_name)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Spotify and TIDAL API bases are absolute http(s) URLs
    /// - Event buffer size is greater than zero
    /// - Player name is not blank
    pub fn validate(&self) -> Result<()> {
        validate_api_base("Spotify", &self.spotify_api_base)?;
        validate_api_base("TIDAL", &self.tidal_api_base)?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.player_name.trim().is_empty() {
            return Err(Error::Config("Player name cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn validate_api_base(service: &str, base: &str) -> Result<()> {
    if base.trim().is_empty() {
        return Err(Error::Config(format!(
            "{} API base URL cannot be empty",
            service
        )));
    }

    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(Error::Config(format!(
            "{} API base URL must start with http:// or https://, got '{}'",
            service, base
        )));
    }

    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for the queue snapshot and platform \
                 preference. Desktop: enable the 'desktop-shims' feature and set a settings path \
                 to use the default SqliteSettingsStore. Browser shells: inject a \
                 localStorage-backed store."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for platform Web API calls. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Browser shells: inject a fetch-based client."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(settings_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = settings_path.ok_or_else(|| Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "No SettingsStore was injected and no settings path was set. \
                 Use .settings_store() or .settings_path() to provide one."
            .to_string(),
    })?;

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime; initialize on a plain thread instead
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(
    _settings_path: Option<PathBuf>,
) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    platform_overrides: PlatformOverrides,
    event_buffer_size: Option<usize>,
    spotify_api_base: Option<String>,
    tidal_api_base: Option<String>,
    player_name: Option<String>,
}

impl CoreConfigBuilder {
    /// Sets the durable key-value store.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the SQLite file used by the desktop default settings store.
    ///
    /// Ignored when a store is injected with [`settings_store`](Self::settings_store).
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Sets the HTTP client.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets one explicit platform override.
    ///
    /// Recognized keys are `PLAYBACK_PLATFORM`, `PLAYER_PLATFORM`,
    /// `USER_LIBRARY_PLATFORM` and `LIBRARY_PLATFORM`. Other keys are kept but
    /// never consulted.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .platform_override("PLAYBACK_PLATFORM", "apple-music");
    /// ```
    pub fn platform_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.platform_overrides.insert(key, value);
        self
    }

    /// Reads the recognized override keys from the process environment.
    pub fn overrides_from_env(mut self) -> Self {
        self.platform_overrides.merge_env();
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the Spotify Web API base URL. A trailing slash is removed.
    pub fn spotify_api_base(mut self, base: impl Into<String>) -> Self {
        self.spotify_api_base = Some(base.into());
        self
    }

    /// Sets the TIDAL Open API base URL. A trailing slash is removed.
    pub fn tidal_api_base(mut self, base: impl Into<String>) -> Self {
        self.tidal_api_base = Some(base.into());
        self
    }

    /// Sets the device name announced to Spotify Connect.
    pub fn player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` when a required bridge is absent and no
    ///   desktop default applies
    /// - `Error::Config` when a value is invalid
    pub fn build(self) -> Result<CoreConfig> {
        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path)?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let spotify_api_base = self
            .spotify_api_base
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SPOTIFY_API_BASE.to_string());
        let tidal_api_base = self
            .tidal_api_base
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_TIDAL_API_BASE.to_string());

        let config = CoreConfig {
            settings_store,
            http_client,
            platform_overrides: self.platform_overrides,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            spotify_api_base,
            tidal_api_base,
            player_name: self
                .player_name
                .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_string()),
        };

        config.validate()?;

        Ok(config)
    }
}
