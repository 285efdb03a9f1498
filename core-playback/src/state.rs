//! Normalized playback state

use core_library::NormalizedTrack;
use serde::{Deserialize, Serialize};

/// Snapshot of what the player is doing.
///
/// Replaced wholesale on every update; listeners always receive a complete
/// state, never a patch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_ready: bool,
    pub is_connected: bool,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub track: Option<NormalizedTrack>,
    pub device_id: Option<String>,
}

impl PlaybackState {
    pub fn track_id(&self) -> Option<&str> {
        self.track.as_ref().map(|track| track.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let state = PlaybackState::default();
        assert!(!state.is_ready);
        assert!(!state.is_connected);
        assert_eq!(state.position_ms, 0);
        assert_eq!(state.track_id(), None);
        assert_eq!(state.device_id, None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(PlaybackState::default()).unwrap();
        assert_eq!(json["isReady"], false);
        assert_eq!(json["positionMs"], 0);
        assert!(json["track"].is_null());
        assert!(json["deviceId"].is_null());
    }
}
