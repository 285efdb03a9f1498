use crate::capabilities::PlaybackCapabilities;
use crate::error::{PlaybackError, Result};
use crate::listeners::{ListenerHandle, StateListener};
use crate::state::PlaybackState;
use crate::traits::PlaybackAdapter;
use async_trait::async_trait;
use core_runtime::Platform;

/// Adapter for a platform without playback support.
///
/// Every command, `connect` included, fails with "not available yet".
#[derive(Debug, Clone, Copy)]
pub struct UnavailablePlaybackAdapter {
    platform: Platform,
}

impl UnavailablePlaybackAdapter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn unavailable(&self) -> Result<()> {
        Err(PlaybackError::NotAvailable {
            platform: self.platform,
        })
    }
}

#[async_trait]
impl PlaybackAdapter for UnavailablePlaybackAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn capabilities(&self) -> PlaybackCapabilities {
        PlaybackCapabilities::NONE
    }

    fn state(&self) -> PlaybackState {
        PlaybackState::default()
    }

    async fn connect(&self) -> Result<()> {
        self.unavailable()
    }

    async fn disconnect(&self) -> Result<()> {
        self.unavailable()
    }

    async fn play(&self) -> Result<()> {
        self.unavailable()
    }

    async fn pause(&self) -> Result<()> {
        self.unavailable()
    }

    async fn toggle_play(&self) -> Result<()> {
        self.unavailable()
    }

    async fn seek(&self, _position_ms: u64) -> Result<()> {
        self.unavailable()
    }

    async fn play_track(&self, _uri: &str) -> Result<()> {
        self.unavailable()
    }

    fn on_state_change(&self, _listener: StateListener) -> ListenerHandle {
        ListenerHandle::inert()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_command_fails() {
        let adapter = UnavailablePlaybackAdapter::new(Platform::Tidal);

        for result in [
            adapter.connect().await,
            adapter.play().await,
            adapter.pause().await,
            adapter.toggle_play().await,
            adapter.seek(1000).await,
            adapter.play_track("tidal:track:1").await,
            adapter.disconnect().await,
        ] {
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "Tidal playback is not available yet.");
        }
    }

    #[test]
    fn test_listener_is_not_registered() {
        let adapter = UnavailablePlaybackAdapter::new(Platform::Deezer);
        let handle = adapter.on_state_change(Arc::new(|_: &PlaybackState| panic!("must not be called")));
        assert!(handle.is_inert());
        assert_eq!(adapter.state(), PlaybackState::default());
    }
}
