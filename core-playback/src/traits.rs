//! # Playback Adapter Trait
//!
//! One implementation per platform wraps that platform's native playback
//! control surface. Unsupported platforms use an adapter whose every command
//! fails with [`PlaybackError::NotAvailable`](crate::PlaybackError::NotAvailable).

use crate::capabilities::PlaybackCapabilities;
use crate::error::Result;
use crate::listeners::{ListenerHandle, StateListener};
use crate::state::PlaybackState;
use async_trait::async_trait;
use core_runtime::Platform;

#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> PlaybackCapabilities;

    /// Current state snapshot.
    fn state(&self) -> PlaybackState;

    /// Create and connect the platform player.
    ///
    /// Calling it while a player exists or a connect is in flight is a no-op.
    async fn connect(&self) -> Result<()>;

    /// Tear the player down and reset to the default state.
    async fn disconnect(&self) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn toggle_play(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Start playing the track identified by a platform URI.
    ///
    /// # Errors
    ///
    /// Fails without any network call when `uri` is empty or no device is
    /// ready.
    async fn play_track(&self, uri: &str) -> Result<()>;

    /// Register a listener; it receives the current state immediately.
    fn on_state_change(&self, listener: StateListener) -> ListenerHandle;
}
