//! Static per-platform playback capability descriptors
//!
//! Surrounding UI uses these to disable controls. The coordinator does not
//! enforce them.

use core_runtime::Platform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackCapabilities {
    pub can_play_pause: bool,
    pub can_seek: bool,
    pub can_skip: bool,
    pub supports_transfer: bool,
    pub supports_remote_control: bool,
    pub supports_sync: bool,
    pub requires_premium: bool,
}

impl PlaybackCapabilities {
    /// Nothing supported.
    pub const NONE: Self = Self {
        can_play_pause: false,
        can_seek: false,
        can_skip: false,
        supports_transfer: false,
        supports_remote_control: false,
        supports_sync: false,
        requires_premium: false,
    };

    /// Spotify Web Playback SDK; a Premium account is required.
    pub const SPOTIFY: Self = Self {
        can_play_pause: true,
        can_seek: true,
        can_skip: true,
        supports_transfer: true,
        supports_remote_control: true,
        supports_sync: true,
        requires_premium: true,
    };

    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Spotify => Self::SPOTIFY,
            Platform::Deezer | Platform::AppleMusic | Platform::Tidal => Self::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_platform() {
        assert!(PlaybackCapabilities::for_platform(Platform::Spotify).requires_premium);
        assert_eq!(
            PlaybackCapabilities::for_platform(Platform::Tidal),
            PlaybackCapabilities::default()
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(PlaybackCapabilities::SPOTIFY).unwrap();
        assert_eq!(json["canPlayPause"], true);
        assert_eq!(json["supportsRemoteControl"], true);
    }
}
