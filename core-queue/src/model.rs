//! Queue data model
//!
//! [`Queue`] holds the pure state transitions. Mode checks, persistence and
//! events live in [`QueueStore`](crate::store::QueueStore).

use core_library::NormalizedTrack;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown artist";

/// Separator between artist and the rest of a track subtitle.
const SUBTITLE_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Local queue, freely mutable
    #[default]
    Host,
    /// Mirrors a shared queue; read-only
    Guest,
}

/// One entry of the play queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTrack {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub title: String,
    pub artist: String,
    pub cover_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl QueueTrack {
    /// Whether this entry is the track a player reports as `track_id`.
    ///
    /// Platform URIs often embed the id after a colon, so
    /// `spotify:track:abc` matches `abc`.
    pub fn is_playing(&self, track_id: &str) -> bool {
        if self.id == track_id {
            return true;
        }
        self.uri
            .as_deref()
            .and_then(|uri| uri.strip_suffix(track_id))
            .is_some_and(|prefix| prefix.ends_with(':'))
    }
}

impl From<&NormalizedTrack> for QueueTrack {
    fn from(track: &NormalizedTrack) -> Self {
        Self {
            id: track.id.clone(),
            uri: track.uri.clone(),
            title: track.title.clone(),
            artist: artist_from_subtitle(&track.subtitle),
            cover_url: track.cover_url.clone(),
            duration_ms: track.duration_ms,
        }
    }
}

fn artist_from_subtitle(subtitle: &str) -> String {
    let head = subtitle.split(SUBTITLE_SEPARATOR).next().unwrap_or_default();
    if !head.is_empty() {
        head.to_string()
    } else if !subtitle.is_empty() {
        subtitle.to_string()
    } else {
        UNKNOWN_ARTIST.to_string()
    }
}

/// Position of `selected` in `tracks`, matching on id or uri.
pub fn find_track_index(tracks: &[NormalizedTrack], selected: &str) -> Option<usize> {
    tracks
        .iter()
        .position(|track| track.id == selected || track.uri.as_deref() == Some(selected))
}

/// Queue state shared with guests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(default)]
    pub items: Vec<QueueTrack>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub last_played_track_id: Option<String>,
    #[serde(default)]
    pub last_played_position_ms: u64,
}

/// The session play queue.
///
/// `current_index` is always a valid index into `items`, or 0 when the
/// queue is empty. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    pub mode: QueueMode,
    pub items: Vec<QueueTrack>,
    pub current_index: usize,
    pub updated_at: i64,
    pub last_played_track_id: Option<String>,
    pub last_played_position_ms: u64,
    pub last_played_at: i64,
}

fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

impl Queue {
    pub fn new(now: i64) -> Self {
        Self {
            mode: QueueMode::Host,
            items: Vec::new(),
            current_index: 0,
            updated_at: now,
            last_played_track_id: None,
            last_played_position_ms: 0,
            last_played_at: now,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == QueueMode::Guest
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_track(&self) -> Option<&QueueTrack> {
        self.items.get(self.current_index)
    }

    /// Entries after the current one.
    pub fn upcoming(&self) -> &[QueueTrack] {
        self.items.get(self.current_index + 1..).unwrap_or_default()
    }

    /// Index of the entry the player reports as `track_id`.
    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.is_playing(track_id))
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items.clone(),
            current_index: self.current_index,
            updated_at: self.updated_at,
            last_played_track_id: self.last_played_track_id.clone(),
            last_played_position_ms: self.last_played_position_ms,
        }
    }

    fn restart_playback_tracking(&mut self, now: i64) {
        self.last_played_track_id = self.current_track().map(|track| track.id.clone());
        self.last_played_position_ms = 0;
        self.last_played_at = now;
    }

    pub(crate) fn replace(&mut self, tracks: Vec<QueueTrack>, start_index: usize, now: i64) {
        self.current_index = clamp_index(start_index, tracks.len());
        self.items = tracks;
        self.updated_at = now;
        self.restart_playback_tracking(now);
    }

    pub(crate) fn append(&mut self, tracks: Vec<QueueTrack>, now: i64) {
        self.items.extend(tracks);
        self.updated_at = now;
    }

    /// Consume the current entry and everything before it.
    pub(crate) fn advance(&mut self, now: i64) {
        let next = self.current_index + 1;
        if next >= self.items.len() {
            self.items.clear();
        } else {
            self.items.drain(..next);
        }
        self.current_index = 0;
        self.updated_at = now;
        self.restart_playback_tracking(now);
    }

    pub(crate) fn set_current_index(&mut self, index: usize, now: i64) {
        self.current_index = clamp_index(index, self.items.len());
        self.updated_at = now;
        self.restart_playback_tracking(now);
    }

    pub(crate) fn record_progress(&mut self, track_id: &str, position_ms: u64, now: i64) {
        self.last_played_track_id = Some(track_id.to_string());
        self.last_played_position_ms = position_ms;
        self.last_played_at = now;
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: QueueSnapshot, now: i64) {
        self.mode = QueueMode::Guest;
        self.current_index = clamp_index(snapshot.current_index, snapshot.items.len());
        self.items = snapshot.items;
        self.updated_at = snapshot.updated_at;
        self.last_played_track_id = snapshot.last_played_track_id;
        self.last_played_position_ms = snapshot.last_played_position_ms;
        self.last_played_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(id: &str, subtitle: &str) -> NormalizedTrack {
        NormalizedTrack {
            id: id.to_string(),
            title: format!("Title {}", id),
            subtitle: subtitle.to_string(),
            cover_url: "/cover.png".to_string(),
            uri: Some(format!("spotify:track:{}", id)),
            duration_ms: Some(180_000),
        }
    }

    fn entry(id: &str) -> QueueTrack {
        QueueTrack::from(&normalized(id, "Artist"))
    }

    fn queue_of(ids: &[&str]) -> Queue {
        let mut queue = Queue::new(0);
        queue.replace(ids.iter().map(|id| entry(id)).collect(), 0, 0);
        queue
    }

    #[test]
    fn test_artist_extraction() {
        assert_eq!(artist_from_subtitle("Daft Punk - Discovery"), "Daft Punk");
        assert_eq!(artist_from_subtitle("Daft Punk, Pharrell"), "Daft Punk, Pharrell");
        assert_eq!(artist_from_subtitle(" - Discovery"), " - Discovery");
        assert_eq!(artist_from_subtitle(""), UNKNOWN_ARTIST);
    }

    #[test]
    fn test_queue_track_copies_fields() {
        let track = QueueTrack::from(&normalized("t1", "Air - Moon Safari"));
        assert_eq!(track.id, "t1");
        assert_eq!(track.uri.as_deref(), Some("spotify:track:t1"));
        assert_eq!(track.artist, "Air");
        assert_eq!(track.duration_ms, Some(180_000));
    }

    #[test]
    fn test_is_playing_matches_id_or_uri_suffix() {
        let track = entry("abc");
        assert!(track.is_playing("abc"));

        let mut renamed = track.clone();
        renamed.id = "local-1".to_string();
        assert!(renamed.is_playing("abc"));
        assert!(!renamed.is_playing("bc"));
        assert!(!renamed.is_playing("xyz"));
    }

    #[test]
    fn test_find_track_index_by_id_or_uri() {
        let tracks = vec![normalized("a", ""), normalized("b", "")];
        assert_eq!(find_track_index(&tracks, "b"), Some(1));
        assert_eq!(find_track_index(&tracks, "spotify:track:a"), Some(0));
        assert_eq!(find_track_index(&tracks, "c"), None);
    }

    #[test]
    fn test_replace_clamps_index() {
        let mut queue = queue_of(&["a", "b"]);
        queue.replace(vec![entry("x"), entry("y")], 9, 50);
        assert_eq!(queue.current_index, 1);
        assert_eq!(queue.last_played_track_id.as_deref(), Some("y"));
        assert_eq!(queue.updated_at, 50);

        queue.replace(Vec::new(), 3, 60);
        assert_eq!(queue.current_index, 0);
        assert_eq!(queue.last_played_track_id, None);
    }

    #[test]
    fn test_advance_slices_forward() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        queue.set_current_index(1, 10);
        queue.advance(20);

        let ids: Vec<_> = queue.items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert_eq!(queue.current_index, 0);
        assert_eq!(queue.last_played_track_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_advance_past_end_clears() {
        let mut queue = queue_of(&["a", "b"]);
        queue.set_current_index(1, 10);
        queue.advance(20);

        assert!(queue.is_empty());
        assert_eq!(queue.current_index, 0);
        assert_eq!(queue.last_played_track_id, None);
    }

    #[test]
    fn test_upcoming() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.upcoming().len(), 2);
        queue.set_current_index(2, 0);
        assert!(queue.upcoming().is_empty());
        assert!(Queue::new(0).upcoming().is_empty());
    }

    #[test]
    fn test_apply_snapshot_enters_guest_mode() {
        let mut queue = queue_of(&["a"]);
        queue.apply_snapshot(
            QueueSnapshot {
                items: vec![entry("x"), entry("y")],
                current_index: 7,
                updated_at: 123,
                last_played_track_id: Some("y".to_string()),
                last_played_position_ms: 4_000,
            },
            999,
        );

        assert!(queue.is_read_only());
        assert_eq!(queue.current_index, 1);
        assert_eq!(queue.updated_at, 123);
        assert_eq!(queue.last_played_position_ms, 4_000);
        assert_eq!(queue.last_played_at, 999);
    }

    #[test]
    fn test_persisted_shape_is_camel_case() {
        let json = serde_json::to_value(queue_of(&["a"])).unwrap();
        assert_eq!(json["mode"], "host");
        assert_eq!(json["currentIndex"], 0);
        assert_eq!(json["lastPlayedTrackId"], "a");
        assert_eq!(json["items"][0]["coverUrl"], "/cover.png");
    }
}
