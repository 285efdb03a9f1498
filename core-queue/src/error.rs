//! # Queue Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The selected track is not in the loaded part of the playlist.
    #[error("Track {track_id} not found in loaded playlist {playlist_id}")]
    TrackNotFound {
        playlist_id: String,
        track_id: String,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;
