//! # Spotify Playback Adapter
//!
//! Drives the Spotify Web Playback SDK through two seams:
//!
//! - [`SpotifySdk`] creates a [`SpotifyPlayer`] and hands it a channel for
//!   its callbacks. The host owns SDK loading.
//! - SDK callbacks arrive as [`SdkEvent`] messages. A pump task drains the
//!   channel into [`SpotifyPlaybackAdapter::handle_sdk_event`].
//!
//! Starting a specific track and transferring playback to the SDK device go
//! through the Web API.

use crate::capabilities::PlaybackCapabilities;
use crate::error::{PlaybackError, Result};
use crate::listeners::{ListenerHandle, StateListener, StateListeners};
use crate::state::PlaybackState;
use crate::traits::PlaybackAdapter;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::storage::SettingsStore;
use core_library::NormalizedTrack;
use core_runtime::platform::keys;
use core_runtime::Platform;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Cover shown when the SDK reports no album art
pub const DEFAULT_COVER: &str = "/images/test/song-cover.png";

const UNKNOWN_ARTIST: &str = "Unknown artist";
const PLAYER_NOT_READY: &str = "Spotify player not ready.";
const DEVICE_NOT_READY: &str = "Spotify device not ready.";

// ============================================================================
// SDK Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkArtist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SdkAlbum {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<SdkImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SdkArtist>,
    #[serde(default)]
    pub album: Option<SdkAlbum>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SdkTrackWindow {
    #[serde(default)]
    pub current_track: Option<SdkTrack>,
}

/// `player_state_changed` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkPlayerState {
    pub paused: bool,
    pub position: u64,
    pub duration: u64,
    #[serde(default)]
    pub track_window: SdkTrackWindow,
}

/// Callback delivered by the SDK player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    /// `None` means the SDK has no state to report, not that playback stopped.
    StateChanged(Option<SdkPlayerState>),
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
}

// ============================================================================
// SDK Seams
// ============================================================================

/// Factory for SDK players, provided by the host.
#[async_trait]
pub trait SpotifySdk: Send + Sync {
    /// Create a player named `name` that reports its callbacks on `events`.
    async fn create_player(
        &self,
        name: &str,
        events: mpsc::UnboundedSender<SdkEvent>,
    ) -> Result<Arc<dyn SpotifyPlayer>>;
}

/// One SDK player instance.
#[async_trait]
pub trait SpotifyPlayer: Send + Sync {
    /// Returns whether the SDK accepted the connection.
    async fn connect(&self) -> Result<bool>;

    async fn disconnect(&self);

    async fn current_state(&self) -> Result<Option<SdkPlayerState>>;

    async fn resume(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn toggle_play(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;
}

// ============================================================================
// Adapter
// ============================================================================

struct Inner {
    sdk: Arc<dyn SpotifySdk>,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn SettingsStore>,
    api_base: String,
    player_name: String,
    player: Mutex<Option<Arc<dyn SpotifyPlayer>>>,
    connecting: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
    listeners: StateListeners,
}

/// Clears the in-flight flag when `connect` finishes or is dropped.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct SpotifyPlaybackAdapter {
    inner: Arc<Inner>,
}

impl SpotifyPlaybackAdapter {
    pub fn new(
        sdk: Arc<dyn SpotifySdk>,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SettingsStore>,
        api_base: impl Into<String>,
        player_name: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sdk,
                http,
                store,
                api_base: api_base.into(),
                player_name: player_name.into(),
                player: Mutex::new(None),
                connecting: AtomicBool::new(false),
                pump: Mutex::new(None),
                listeners: StateListeners::new(),
            }),
        }
    }

    /// Apply one SDK callback to the adapter state.
    pub fn handle_sdk_event(&self, event: SdkEvent) {
        match event {
            SdkEvent::Ready { device_id } => {
                info!(device_id = %device_id, "Spotify player ready");
                self.update(|state| {
                    state.is_ready = true;
                    state.device_id = Some(device_id.clone());
                });
                self.spawn_transfer(device_id);
            }
            SdkEvent::NotReady { device_id } => {
                let applied = self.inner.listeners.update(|state| {
                    if state.device_id.as_deref() != Some(device_id.as_str()) {
                        return false;
                    }
                    state.is_ready = false;
                    true
                });
                if applied {
                    info!(device_id = %device_id, "Spotify player not ready");
                } else {
                    debug!(device_id = %device_id, "Ignoring not_ready for another device");
                }
            }
            SdkEvent::StateChanged(Some(player_state)) => self.apply_player_state(&player_state),
            SdkEvent::StateChanged(None) => debug!("Empty player state ignored"),
            SdkEvent::InitializationError { message } => {
                warn!(%message, "Spotify initialization error")
            }
            SdkEvent::AuthenticationError { message } => {
                warn!(%message, "Spotify authentication error")
            }
            SdkEvent::AccountError { message } => warn!(%message, "Spotify account error"),
        }
    }

    fn update(&self, f: impl FnOnce(&mut PlaybackState)) {
        self.inner.listeners.update(|state| {
            f(state);
            true
        });
    }

    fn apply_player_state(&self, player_state: &SdkPlayerState) {
        let track = map_track(player_state);
        self.update(|state| {
            state.is_playing = !player_state.paused;
            state.position_ms = player_state.position;
            state.duration_ms = player_state.duration;
            state.track = track;
        });
    }

    fn player(&self) -> Result<Arc<dyn SpotifyPlayer>> {
        self.inner
            .player
            .lock()
            .clone()
            .ok_or_else(|| PlaybackError::not_ready(PLAYER_NOT_READY))
    }

    async fn access_token(&self) -> Result<String> {
        self.inner
            .store
            .get_non_empty(keys::SPOTIFY_ACCESS_TOKEN)
            .await?
            .ok_or(PlaybackError::MissingCredential {
                platform: Platform::Spotify,
            })
    }

    fn spawn_pump(&self, mut events: mpsc::UnboundedReceiver<SdkEvent>) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                SpotifyPlaybackAdapter { inner }.handle_sdk_event(event);
            }
            debug!("Spotify SDK event channel closed");
        });

        if let Some(previous) = self.inner.pump.lock().replace(handle) {
            previous.abort();
        }
    }

    fn spawn_transfer(&self, device_id: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, playback transfer skipped");
            return;
        };
        let adapter = self.clone();
        runtime.spawn(async move {
            if let Err(e) = adapter.transfer_playback(&device_id).await {
                warn!(error = %e, "Transfer playback failed");
            }
        });
    }

    #[instrument(skip(self))]
    async fn transfer_playback(&self, device_id: &str) -> Result<()> {
        let token = self.access_token().await?;
        let request = HttpRequest::new(
            HttpMethod::Put,
            format!("{}/me/player", self.inner.api_base),
        )
        .bearer_token(token)
        .json(&json!({ "device_ids": [device_id], "play": false }))?;
        self.send(request).await
    }

    async fn send(&self, request: HttpRequest) -> Result<()> {
        let response = self.inner.http.execute(request).await?;
        if response.is_success() {
            return Ok(());
        }

        let body = response.text_lossy();
        let body = body.trim();
        warn!(status = response.status, "Spotify playback request failed");
        Err(PlaybackError::Backend {
            status: response.status,
            message: if body.is_empty() {
                "Please try again later.".to_string()
            } else {
                body.to_string()
            },
        })
    }

    async fn connect_player(&self) -> Result<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let player = self
            .inner
            .sdk
            .create_player(&self.inner.player_name, events_tx)
            .await?;
        *self.inner.player.lock() = Some(player.clone());
        self.spawn_pump(events_rx);

        let connected = player.connect().await?;
        debug!(connected, "Spotify player connect returned");
        self.update(|state| state.is_connected = connected);

        if let Some(initial) = player.current_state().await? {
            self.apply_player_state(&initial);
        }
        Ok(())
    }
}

#[async_trait]
impl PlaybackAdapter for SpotifyPlaybackAdapter {
    fn platform(&self) -> Platform {
        Platform::Spotify
    }

    fn capabilities(&self) -> PlaybackCapabilities {
        PlaybackCapabilities::SPOTIFY
    }

    fn state(&self) -> PlaybackState {
        self.inner.listeners.state()
    }

    #[instrument(skip(self))]
    async fn connect(&self) -> Result<()> {
        if self.inner.player.lock().is_some() || self.inner.connecting.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.access_token().await?;

        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = ConnectingGuard(&self.inner.connecting);

        self.connect_player().await
    }

    #[instrument(skip(self))]
    async fn disconnect(&self) -> Result<()> {
        let Some(player) = self.inner.player.lock().take() else {
            return Ok(());
        };

        player.disconnect().await;
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        self.update(|state| *state = PlaybackState::default());
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.player()?.resume().await
    }

    async fn pause(&self) -> Result<()> {
        self.player()?.pause().await
    }

    async fn toggle_play(&self) -> Result<()> {
        self.player()?.toggle_play().await
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        self.player()?.seek(position_ms).await
    }

    #[instrument(skip(self))]
    async fn play_track(&self, uri: &str) -> Result<()> {
        if uri.trim().is_empty() {
            return Err(PlaybackError::MissingTrackUri);
        }
        self.player()?;
        let token = self.access_token().await?;
        let device_id = self
            .inner
            .listeners
            .state()
            .device_id
            .ok_or_else(|| PlaybackError::not_ready(DEVICE_NOT_READY))?;

        let url = format!(
            "{}/me/player/play?device_id={}",
            self.inner.api_base,
            urlencoding::encode(&device_id)
        );
        let request = HttpRequest::new(HttpMethod::Put, url)
            .bearer_token(token)
            .json(&json!({ "uris": [uri] }))?;
        self.send(request).await
    }

    fn on_state_change(&self, listener: StateListener) -> ListenerHandle {
        self.inner.listeners.subscribe(listener)
    }
}

fn map_track(player_state: &SdkPlayerState) -> Option<NormalizedTrack> {
    let track = player_state.track_window.current_track.as_ref()?;

    let artists: Vec<&str> = track
        .artists
        .iter()
        .map(|artist| artist.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    let subtitle = if artists.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        artists.join(", ")
    };

    let cover_url = track
        .album
        .as_ref()
        .and_then(|album| album.images.first())
        .map(|image| image.url.clone())
        .unwrap_or_else(|| DEFAULT_COVER.to_string());

    Some(NormalizedTrack {
        id: track
            .id
            .clone()
            .or_else(|| track.uri.clone())
            .unwrap_or_else(|| track.name.clone()),
        title: track.name.clone(),
        subtitle,
        cover_url,
        uri: track.uri.clone(),
        duration_ms: Some(player_state.duration),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_state(paused: bool, position: u64) -> SdkPlayerState {
        SdkPlayerState {
            paused,
            position,
            duration: 200_000,
            track_window: SdkTrackWindow {
                current_track: Some(SdkTrack {
                    id: Some("t1".to_string()),
                    uri: Some("spotify:track:t1".to_string()),
                    name: "Song".to_string(),
                    artists: vec![
                        SdkArtist {
                            name: "A".to_string(),
                        },
                        SdkArtist {
                            name: "B".to_string(),
                        },
                    ],
                    album: None,
                }),
            },
        }
    }

    #[test]
    fn test_map_track() {
        let track = map_track(&player_state(false, 0)).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.subtitle, "A, B");
        assert_eq!(track.cover_url, DEFAULT_COVER);
        assert_eq!(track.uri.as_deref(), Some("spotify:track:t1"));
        assert_eq!(track.duration_ms, Some(200_000));
    }

    #[test]
    fn test_map_track_without_current_track() {
        let state = SdkPlayerState {
            paused: true,
            position: 0,
            duration: 0,
            track_window: SdkTrackWindow::default(),
        };
        assert_eq!(map_track(&state), None);
    }

    #[test]
    fn test_player_state_deserializes_sdk_payload() {
        let state: SdkPlayerState = serde_json::from_str(
            r#"{
                "paused": false,
                "position": 1000,
                "duration": 5000,
                "track_window": {
                    "current_track": {
                        "id": "t2",
                        "uri": "spotify:track:t2",
                        "name": "Other",
                        "artists": [{"name": "C"}],
                        "album": {"name": "Album", "images": [{"url": "https://img/t2"}]}
                    }
                }
            }"#,
        )
        .unwrap();

        let track = map_track(&state).unwrap();
        assert_eq!(track.cover_url, "https://img/t2");
        assert_eq!(track.subtitle, "C");
    }
}
