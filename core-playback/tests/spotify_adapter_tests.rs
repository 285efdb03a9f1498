//! Spotify playback adapter against mocked SDK and Web API

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::MemorySettingsStore;
use bytes::Bytes;
use core_playback::adapters::spotify::{SdkArtist, SdkTrack, SdkTrackWindow};
use core_playback::{
    PlaybackAdapter, PlaybackError, PlaybackState, Result, SdkEvent, SdkPlayerState,
    SpotifyPlaybackAdapter, SpotifyPlayer, SpotifySdk, StateListener,
};
use core_runtime::platform::keys;
use mockall::mock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const API: &str = "https://api.spotify.com/v1";

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

mock! {
    Player {}

    #[async_trait]
    impl SpotifyPlayer for Player {
        async fn connect(&self) -> Result<bool>;
        async fn disconnect(&self);
        async fn current_state(&self) -> Result<Option<SdkPlayerState>>;
        async fn resume(&self) -> Result<()>;
        async fn pause(&self) -> Result<()>;
        async fn toggle_play(&self) -> Result<()>;
        async fn seek(&self, position_ms: u64) -> Result<()>;
    }
}

/// Hands out one prepared player and keeps the event sender for the test.
struct FakeSdk {
    player: Arc<dyn SpotifyPlayer>,
    created: AtomicUsize,
    events: Mutex<Option<mpsc::UnboundedSender<SdkEvent>>>,
}

impl FakeSdk {
    fn new(player: MockPlayer) -> Arc<Self> {
        Arc::new(Self {
            player: Arc::new(player),
            created: AtomicUsize::new(0),
            events: Mutex::new(None),
        })
    }

    fn send(&self, event: SdkEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            events.send(event).unwrap();
        }
    }
}

#[async_trait]
impl SpotifySdk for FakeSdk {
    async fn create_player(
        &self,
        name: &str,
        events: mpsc::UnboundedSender<SdkEvent>,
    ) -> Result<Arc<dyn SpotifyPlayer>> {
        assert_eq!(name, "Web Player");
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.events.lock() = Some(events);
        Ok(self.player.clone())
    }
}

fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

fn token_store() -> Arc<MemorySettingsStore> {
    Arc::new(MemorySettingsStore::with_strings([(
        keys::SPOTIFY_ACCESS_TOKEN,
        "token-123",
    )]))
}

fn connectable_player() -> MockPlayer {
    let mut player = MockPlayer::new();
    player.expect_connect().returning(|| Ok(true));
    player.expect_current_state().returning(|| Ok(None));
    player
}

fn adapter(
    sdk: Arc<FakeSdk>,
    http: MockHttpClient,
    store: Arc<MemorySettingsStore>,
) -> SpotifyPlaybackAdapter {
    SpotifyPlaybackAdapter::new(sdk, Arc::new(http), store, API, "Web Player")
}

fn sdk_state(paused: bool, position: u64) -> SdkPlayerState {
    SdkPlayerState {
        paused,
        position,
        duration: 200_000,
        track_window: SdkTrackWindow {
            current_track: Some(SdkTrack {
                id: Some("t1".to_string()),
                uri: Some("spotify:track:t1".to_string()),
                name: "Song".to_string(),
                artists: vec![SdkArtist {
                    name: "Artist".to_string(),
                }],
                album: None,
            }),
        },
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_connect_requires_token() {
    let sdk = FakeSdk::new(MockPlayer::new());
    let adapter = adapter(sdk.clone(), MockHttpClient::new(), Arc::new(MemorySettingsStore::new()));

    let err = adapter.connect().await.unwrap_err();
    assert!(matches!(err, PlaybackError::MissingCredential { .. }));
    assert_eq!(sdk.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connect_applies_initial_state_once() {
    let mut player = MockPlayer::new();
    player.expect_connect().times(1).returning(|| Ok(true));
    player
        .expect_current_state()
        .times(1)
        .returning(|| Ok(Some(sdk_state(false, 1_500))));
    let sdk = FakeSdk::new(player);
    let adapter = adapter(sdk.clone(), MockHttpClient::new(), token_store());

    adapter.connect().await.unwrap();
    adapter.connect().await.unwrap();

    let state = adapter.state();
    assert!(state.is_connected);
    assert!(state.is_playing);
    assert_eq!(state.position_ms, 1_500);
    assert_eq!(state.track_id(), Some("t1"));
    assert_eq!(sdk.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ready_transfers_playback() {
    let (sent_tx, mut sent_rx) = mpsc::unbounded_channel::<HttpRequest>();
    let mut http = MockHttpClient::new();
    http.expect_execute().times(1).returning(move |request| {
        sent_tx.send(request).unwrap();
        Ok(response(204, ""))
    });

    let sdk = FakeSdk::new(connectable_player());
    let adapter = adapter(sdk.clone(), http, token_store());
    adapter.connect().await.unwrap();

    sdk.send(SdkEvent::Ready {
        device_id: "device-1".to_string(),
    });
    wait_until(|| adapter.state().is_ready).await;
    assert_eq!(adapter.state().device_id.as_deref(), Some("device-1"));

    let request = tokio::time::timeout(Duration::from_secs(2), sent_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.url, "https://api.spotify.com/v1/me/player");
    let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["device_ids"][0], "device-1");
    assert_eq!(body["play"], false);
}

#[tokio::test]
async fn test_transfer_failure_is_swallowed() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .returning(|_| Ok(response(502, "Bad gateway")));

    let sdk = FakeSdk::new(connectable_player());
    let adapter = adapter(sdk, http, token_store());

    adapter.handle_sdk_event(SdkEvent::Ready {
        device_id: "device-1".to_string(),
    });
    tokio::task::yield_now().await;

    assert!(adapter.state().is_ready);
}

#[tokio::test]
async fn test_not_ready_only_for_tracked_device() {
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(|_| Ok(response(204, "")));
    let adapter = adapter(FakeSdk::new(MockPlayer::new()), http, token_store());

    adapter.handle_sdk_event(SdkEvent::Ready {
        device_id: "device-1".to_string(),
    });
    adapter.handle_sdk_event(SdkEvent::NotReady {
        device_id: "device-stale".to_string(),
    });
    assert!(adapter.state().is_ready);

    adapter.handle_sdk_event(SdkEvent::NotReady {
        device_id: "device-1".to_string(),
    });
    assert!(!adapter.state().is_ready);
}

#[tokio::test]
async fn test_null_player_state_is_ignored() {
    let adapter = adapter(FakeSdk::new(MockPlayer::new()), MockHttpClient::new(), token_store());
    let seen = Arc::new(AtomicUsize::new(0));
    let listener: StateListener = {
        let seen = seen.clone();
        Arc::new(move |_state: &PlaybackState| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _handle = adapter.on_state_change(listener);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    adapter.handle_sdk_event(SdkEvent::StateChanged(Some(sdk_state(true, 10_000))));
    adapter.handle_sdk_event(SdkEvent::StateChanged(None));

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    let state = adapter.state();
    assert!(!state.is_playing);
    assert_eq!(state.position_ms, 10_000);
    assert_eq!(state.duration_ms, 200_000);
}

#[tokio::test]
async fn test_play_track_preconditions() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);
    let sdk = FakeSdk::new(connectable_player());
    let adapter = adapter(sdk, http, token_store());

    let err = adapter.play_track("").await.unwrap_err();
    assert!(matches!(err, PlaybackError::MissingTrackUri));

    let err = adapter.play_track("spotify:track:t1").await.unwrap_err();
    assert_eq!(err.to_string(), "Spotify player not ready.");

    adapter.connect().await.unwrap();
    let err = adapter.play_track("spotify:track:t1").await.unwrap_err();
    assert_eq!(err.to_string(), "Spotify device not ready.");
}

#[tokio::test]
async fn test_play_track_issues_request() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| request.url.ends_with("/me/player"))
        .returning(|_| Ok(response(204, "")));
    http.expect_execute()
        .times(1)
        .withf(|request| {
            request.url == "https://api.spotify.com/v1/me/player/play?device_id=device-1"
                && request.headers.get("Authorization").map(String::as_str)
                    == Some("Bearer token-123")
        })
        .returning(|request| {
            let body: serde_json::Value =
                serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
            assert_eq!(body["uris"][0], "spotify:track:t7");
            Ok(response(204, ""))
        });

    let sdk = FakeSdk::new(connectable_player());
    let adapter = adapter(sdk, http, token_store());
    adapter.connect().await.unwrap();
    adapter.handle_sdk_event(SdkEvent::Ready {
        device_id: "device-1".to_string(),
    });

    adapter.play_track("spotify:track:t7").await.unwrap();
}

#[tokio::test]
async fn test_play_track_backend_error() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| request.url.ends_with("/me/player"))
        .returning(|_| Ok(response(204, "")));
    http.expect_execute()
        .withf(|request| request.url.contains("/me/player/play"))
        .returning(|_| Ok(response(403, "Premium required")));

    let sdk = FakeSdk::new(connectable_player());
    let adapter = adapter(sdk, http, token_store());
    adapter.connect().await.unwrap();
    adapter.handle_sdk_event(SdkEvent::Ready {
        device_id: "device-1".to_string(),
    });

    let err = adapter.play_track("spotify:track:t7").await.unwrap_err();
    match err {
        PlaybackError::Backend { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Premium required");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_commands_require_player() {
    let mut player = connectable_player();
    player.expect_resume().times(1).returning(|| Ok(()));
    player.expect_seek().withf(|ms| *ms == 30_000).times(1).returning(|_| Ok(()));
    let adapter = adapter(FakeSdk::new(player), MockHttpClient::new(), token_store());

    let err = adapter.play().await.unwrap_err();
    assert!(err.is_not_ready());

    adapter.connect().await.unwrap();
    adapter.play().await.unwrap();
    adapter.seek(30_000).await.unwrap();
}

#[tokio::test]
async fn test_disconnect_resets_state() {
    let mut player = connectable_player();
    player.expect_disconnect().times(1).returning(|| ());
    let adapter = adapter(FakeSdk::new(player), MockHttpClient::new(), token_store());

    adapter.connect().await.unwrap();
    adapter.handle_sdk_event(SdkEvent::StateChanged(Some(sdk_state(false, 100))));
    assert!(adapter.state().is_connected);

    adapter.disconnect().await.unwrap();
    assert_eq!(adapter.state(), PlaybackState::default());

    adapter.disconnect().await.unwrap();
}
