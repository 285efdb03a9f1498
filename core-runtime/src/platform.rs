//! # Platform Selection
//!
//! Decides which streaming platform backs playback and the user library.
//!
//! Resolution runs from scratch on every call, first match wins:
//! 1. Explicit override (two recognized keys per scope, first usable wins)
//! 2. Stored user preference (`active_platform`)
//! 3. Credential markers, checked spotify, deezer, apple_music, tidal
//! 4. Spotify
//!
//! Nothing is cached between calls, so a credential written by the auth flow
//! is picked up by the next resolution without any invalidation signal.

use crate::error::Result;
use bridge_traits::storage::SettingsStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable storage keys shared across the core.
pub mod keys {
    /// The user's explicit platform choice.
    pub const ACTIVE_PLATFORM: &str = "active_platform";
    /// JSON snapshot of the play queue.
    pub const QUEUE_STATE: &str = "queue_state";

    pub const SPOTIFY_ACCESS_TOKEN: &str = "spotify_access_token";
    /// Pending authorization code; counts as a Spotify marker for the library only.
    pub const SPOTIFY_AUTH_CODE: &str = "spotify_auth_code";
    pub const DEEZER_ACCESS_TOKEN: &str = "deezer_access_token";
    pub const APPLE_MUSIC_TOKEN: &str = "apple_music_token";
    pub const TIDAL_ACCESS_TOKEN: &str = "tidal_access_token";
    /// Set to `"true"` while a TIDAL session is live.
    pub const TIDAL_SESSION_ACTIVE: &str = "tidal_session_active";
}

/// Supported streaming platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Spotify,
    Deezer,
    AppleMusic,
    Tidal,
}

impl Platform {
    /// Every platform, in credential-marker priority order.
    pub const ALL: [Platform; 4] = [
        Platform::Spotify,
        Platform::Deezer,
        Platform::AppleMusic,
        Platform::Tidal,
    ];

    /// Stable identifier used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::Deezer => "deezer",
            Platform::AppleMusic => "apple_music",
            Platform::Tidal => "tidal",
        }
    }

    /// Name shown to users, e.g. in "not available yet" messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Spotify => "Spotify",
            Platform::Deezer => "Deezer",
            Platform::AppleMusic => "Apple Music",
            Platform::Tidal => "Tidal",
        }
    }

    /// Service brand used in credential and request-failure messages.
    pub fn service_name(&self) -> &'static str {
        match self {
            Platform::Tidal => "TIDAL",
            other => other.display_name(),
        }
    }

    /// Parse a loosely formatted platform name.
    ///
    /// Input is trimmed and lowercased. `apple`, `apple_music` and
    /// `apple-music` all mean Apple Music. Anything unrecognized is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "spotify" => Some(Platform::Spotify),
            "deezer" => Some(Platform::Deezer),
            "tidal" => Some(Platform::Tidal),
            "apple" | "apple_music" | "apple-music" => Some(Platform::AppleMusic),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which consumer a selector resolves for.
///
/// The two scopes read different override keys, and the library scope also
/// accepts a pending Spotify authorization code as a credential marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverScope {
    Playback,
    Library,
}

impl ResolverScope {
    /// Recognized override keys, highest priority first.
    pub fn override_keys(&self) -> &'static [&'static str] {
        match self {
            ResolverScope::Playback => &["PLAYBACK_PLATFORM", "PLAYER_PLATFORM"],
            ResolverScope::Library => &["USER_LIBRARY_PLATFORM", "LIBRARY_PLATFORM"],
        }
    }
}

/// Explicit platform overrides, keyed by configuration key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformOverrides {
    values: BTreeMap<String, String>,
}

impl PlatformOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every recognized override key from the process environment.
    pub fn from_env() -> Self {
        let mut overrides = Self::new();
        overrides.merge_env();
        overrides
    }

    /// Add recognized keys from the process environment, replacing existing values.
    pub fn merge_env(&mut self) {
        for scope in [ResolverScope::Playback, ResolverScope::Library] {
            for key in scope.override_keys() {
                if let Ok(value) = std::env::var(key) {
                    self.insert(*key, value);
                }
            }
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First override for `scope` that names a known platform.
    ///
    /// Blank and unrecognized values fall through to the next key.
    pub fn resolve(&self, scope: ResolverScope) -> Option<Platform> {
        scope
            .override_keys()
            .iter()
            .filter_map(|key| self.get(key))
            .filter(|raw| !raw.trim().is_empty())
            .find_map(Platform::parse)
    }
}

/// Resolves the active platform for one scope.
#[derive(Clone)]
pub struct PlatformSelector {
    scope: ResolverScope,
    overrides: PlatformOverrides,
    store: Arc<dyn SettingsStore>,
}

impl PlatformSelector {
    pub fn new(
        scope: ResolverScope,
        overrides: PlatformOverrides,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            scope,
            overrides,
            store,
        }
    }

    pub fn scope(&self) -> ResolverScope {
        self.scope
    }

    /// Resolve the active platform.
    ///
    /// Never fails: storage errors are logged and treated as absent values.
    pub async fn resolve(&self) -> Platform {
        let platform = match self.overrides.resolve(self.scope) {
            Some(platform) => platform,
            None => match self.stored_preference().await {
                Some(platform) => platform,
                None => self
                    .detect_from_credentials()
                    .await
                    .unwrap_or(Platform::Spotify),
            },
        };

        debug!(scope = ?self.scope, platform = %platform, "Resolved platform");
        platform
    }

    /// Persist an explicit user choice.
    pub async fn store_preference(&self, platform: Platform) -> Result<()> {
        self.store
            .set_string(keys::ACTIVE_PLATFORM, platform.as_str())
            .await?;
        Ok(())
    }

    /// Forget the explicit user choice.
    pub async fn clear_preference(&self) -> Result<()> {
        self.store.delete(keys::ACTIVE_PLATFORM).await?;
        Ok(())
    }

    /// The stored preference, if it names a known platform.
    pub async fn stored_preference(&self) -> Option<Platform> {
        self.read(keys::ACTIVE_PLATFORM)
            .await
            .and_then(|raw| Platform::parse(&raw))
    }

    async fn detect_from_credentials(&self) -> Option<Platform> {
        for platform in Platform::ALL {
            if self.has_marker(platform).await {
                return Some(platform);
            }
        }
        None
    }

    async fn has_marker(&self, platform: Platform) -> bool {
        match platform {
            Platform::Spotify => {
                self.read(keys::SPOTIFY_ACCESS_TOKEN).await.is_some()
                    || (self.scope == ResolverScope::Library
                        && self.read(keys::SPOTIFY_AUTH_CODE).await.is_some())
            }
            Platform::Deezer => self.read(keys::DEEZER_ACCESS_TOKEN).await.is_some(),
            Platform::AppleMusic => self.read(keys::APPLE_MUSIC_TOKEN).await.is_some(),
            Platform::Tidal => {
                self.read(keys::TIDAL_SESSION_ACTIVE).await.as_deref() == Some("true")
                    || self.read(keys::TIDAL_ACCESS_TOKEN).await.is_some()
            }
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get_non_empty(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read platform marker");
                None
            }
        }
    }
}

impl fmt::Debug for PlatformSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformSelector")
            .field("scope", &self.scope)
            .field("overrides", &self.overrides)
            .finish()
    }
}
