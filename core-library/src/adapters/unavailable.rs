use super::{LibraryAdapter, LikesAdapter, SearchAdapter};
use crate::error::{LibraryError, Result};
use crate::models::{NormalizedPlaylist, NormalizedTrack};
use crate::pagination::{Page, PageRequest};
use async_trait::async_trait;
use core_runtime::Platform;

/// Stand-in for a platform whose library integration does not exist yet.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableAdapter {
    platform: Platform,
}

impl UnavailableAdapter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn fail<T>(&self, what: &str, verb: &str) -> Result<T> {
        Err(LibraryError::Unavailable {
            message: format!(
                "{} {} {} not available yet.",
                self.platform.display_name(),
                what,
                verb
            ),
        })
    }
}

#[async_trait]
impl LibraryAdapter for UnavailableAdapter {
    async fn playlists(&self, _request: PageRequest) -> Result<Page<NormalizedPlaylist>> {
        self.fail("user library", "is")
    }

    async fn playlist_tracks(
        &self,
        _playlist_id: &str,
        _request: PageRequest,
    ) -> Result<Page<NormalizedTrack>> {
        self.fail("user library", "is")
    }
}

#[async_trait]
impl LikesAdapter for UnavailableAdapter {
    async fn liked_tracks(&self, _request: PageRequest) -> Result<Page<NormalizedTrack>> {
        self.fail("liked tracks", "are")
    }
}

#[async_trait]
impl SearchAdapter for UnavailableAdapter {
    async fn search_tracks(
        &self,
        _query: &str,
        _request: PageRequest,
    ) -> Result<Page<NormalizedTrack>> {
        self.fail("search", "is")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_per_capability() {
        let adapter = UnavailableAdapter::new(Platform::Tidal);

        let err = adapter
            .playlist_tracks("pl", PageRequest::first(50))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tidal user library is not available yet.");

        let err = adapter
            .liked_tracks(PageRequest::first(50))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tidal liked tracks are not available yet.");

        let err = adapter
            .search_tracks("q", PageRequest::first(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::Unavailable { .. }));
        assert_eq!(err.to_string(), "Tidal search is not available yet.");
    }
}
