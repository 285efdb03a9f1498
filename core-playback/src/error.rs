//! # Playback Error Types

use bridge_traits::BridgeError;
use core_runtime::Platform;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Availability Errors
    // ========================================================================
    /// The platform has no playback integration.
    #[error("{} playback is not available yet.", .platform.display_name())]
    NotAvailable { platform: Platform },

    /// A command was issued before the player or device finished connecting.
    #[error("{message}")]
    NotReady { message: String },

    /// No access token is stored for the platform.
    #[error("Missing {} access token. Please reconnect to {}.", .platform.display_name(), .platform.display_name())]
    MissingCredential { platform: Platform },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// `play_track` was called without a URI.
    #[error("Missing track URI.")]
    MissingTrackUri,

    /// The platform's Web API rejected a request.
    #[error("Playback request failed ({status}). {message}")]
    Backend { status: u16, message: String },

    /// The platform SDK reported a failure.
    #[error("Playback SDK error: {0}")]
    Sdk(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    pub(crate) fn not_ready(message: impl Into<String>) -> Self {
        PlaybackError::NotReady {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying after the player connects may succeed.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PlaybackError::NotReady { .. })
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
