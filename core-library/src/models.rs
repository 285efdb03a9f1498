//! Normalized library models
//!
//! Every platform adapter translates its wire format into these shapes, so
//! the page caches and the queue never see platform-specific payloads.

use serde::{Deserialize, Serialize};

/// A playable track as shown in lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrack {
    pub id: String,
    pub title: String,
    /// Artist display string
    pub subtitle: String,
    pub cover_url: String,
    /// Platform URI; without one the track cannot be played directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// A user playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPlaylist {
    pub id: String,
    pub title: String,
    /// Track count label, e.g. "12 songs"
    pub subtitle: String,
    pub cover_url: String,
    pub tracks_count: u32,
}
