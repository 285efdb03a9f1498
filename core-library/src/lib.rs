//! # Library Page Cache
//!
//! Paginated, platform-independent access to the user's music library.
//!
//! ## Overview
//!
//! This crate manages:
//! - Normalized track and playlist models shared by every platform
//! - Per-platform library, likes and search adapters behind one dispatch table
//! - A generic cursor pagination cache that accumulates pages per key
//! - Facades for playlists, playlist tracks, liked tracks and search that
//!   follow the active platform and start over when it changes
//!
//! ## Usage
//!
//! ```ignore
//! use core_library::{LibraryAdapterRegistry, SpotifyWebApi, UserLibrary};
//!
//! let api = SpotifyWebApi::new(http_client, settings_store.clone(), "https://api.spotify.com/v1");
//! let registry = Arc::new(LibraryAdapterRegistry::with_spotify(api));
//! let library = UserLibrary::new(library_selector, registry);
//!
//! let playlists = library.load_next_playlists_page().await;
//! if let Some(error) = &playlists.error {
//!     // Failures are stored on the state, never returned
//! }
//! ```

pub mod adapters;
pub mod cache;
pub mod error;
pub mod library;
pub mod likes;
pub mod models;
pub mod pagination;
pub mod search;

pub use adapters::{
    AdapterSet, LibraryAdapter, LibraryAdapterRegistry, LikesAdapter, SearchAdapter,
    SpotifyWebApi, TidalWebApi, UnavailableAdapter,
};
pub use cache::PageCache;
pub use error::{LibraryError, Result};
pub use library::UserLibrary;
pub use likes::UserLibraryLikes;
pub use models::{NormalizedPlaylist, NormalizedTrack};
pub use pagination::{Page, PageRequest, PageState};
pub use search::{SearchState, UserLibrarySearch};
