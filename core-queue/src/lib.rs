//! # Play Queue
//!
//! The session play queue and the policy that advances it.
//!
//! - [`QueueStore`] owns the persisted [`Queue`] and its host/guest mode
//! - [`QueueSync`] follows playback state to advance the queue, and builds
//!   queues from playlists
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(QueueStore::load(settings, clock).await);
//! let sync = QueueSync::new(store.clone(), coordinator, library);
//! sync.attach();
//!
//! sync.replace_queue_from_playlist("playlist-1", "track-7").await?;
//! ```

pub mod error;
pub mod model;
pub mod store;
pub mod sync;

pub use error::{QueueError, Result};
pub use model::{find_track_index, Queue, QueueMode, QueueSnapshot, QueueTrack, UNKNOWN_ARTIST};
pub use store::{Followed, QueueStore};
pub use sync::{
    is_near_end, BuildOutcome, PlaybackControl, PlaylistSource, QueueSync,
    NEAR_END_THRESHOLD_MS,
};
