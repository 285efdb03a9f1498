//! # Playback Coordination
//!
//! Normalizes platform playback behind one state model.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`PlaybackState`] and the static [`PlaybackCapabilities`] per platform
//! - The [`PlaybackAdapter`] trait with a Spotify implementation driven by
//!   SDK callbacks and a "not available yet" implementation for the rest
//! - [`PlaybackCoordinator`], which binds one adapter and fans its state
//!   out to subscribers

pub mod adapters;
pub mod capabilities;
pub mod coordinator;
pub mod error;
pub mod listeners;
pub mod state;
pub mod traits;

pub use adapters::{
    PlaybackAdapterRegistry, SdkEvent, SdkPlayerState, SpotifyPlaybackAdapter, SpotifyPlayer,
    SpotifySdk, UnavailablePlaybackAdapter,
};
pub use capabilities::PlaybackCapabilities;
pub use coordinator::{CoordinatorPhase, PlaybackCoordinator};
pub use error::{PlaybackError, Result};
pub use listeners::{ListenerHandle, StateListener, StateListeners};
pub use state::PlaybackState;
pub use traits::PlaybackAdapter;
