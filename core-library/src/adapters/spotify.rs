//! Spotify Web API library adapters
//!
//! Offset pagination is exposed as an opaque cursor: the cursor is the next
//! offset rendered as a decimal string.

use super::{
    format_track_count, readable_body, LibraryAdapter, LikesAdapter, SearchAdapter, DEFAULT_COVER,
    UNKNOWN_ARTIST,
};
use crate::error::{LibraryError, Result};
use crate::models::{NormalizedPlaylist, NormalizedTrack};
use crate::pagination::{Page, PageRequest};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::storage::SettingsStore;
use core_runtime::platform::keys;
use core_runtime::Platform;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    limit: u64,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TrackTotal {
    #[serde(default)]
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Playlist {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    images: Option<Vec<Image>>,
    #[serde(default)]
    tracks: Option<TrackTotal>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artists: Vec<Artist>,
    #[serde(default)]
    album: Option<Album>,
    #[serde(default)]
    duration_ms: Option<u64>,
}

/// Entry of a playlist or saved-tracks listing; `track` is null for
/// removed or local items.
#[derive(Debug, Deserialize)]
struct TrackItem {
    #[serde(default)]
    track: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<Paging<Track>>,
}

// ============================================================================
// Mapping
// ============================================================================

fn parse_offset(cursor: Option<&str>) -> u64 {
    cursor
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

fn first_image(images: Option<Vec<Image>>) -> String {
    images
        .and_then(|images| images.into_iter().next())
        .map(|image| image.url)
        .unwrap_or_else(|| DEFAULT_COVER.to_string())
}

fn map_playlist(playlist: Playlist) -> NormalizedPlaylist {
    let tracks_count = playlist.tracks.and_then(|t| t.total).unwrap_or(0);
    NormalizedPlaylist {
        id: playlist.id,
        title: playlist.name.unwrap_or_default(),
        subtitle: format_track_count(tracks_count),
        cover_url: first_image(playlist.images),
        tracks_count,
    }
}

fn map_track(track: Track) -> NormalizedTrack {
    let artists: Vec<String> = track
        .artists
        .into_iter()
        .filter_map(|artist| artist.name)
        .filter(|name| !name.is_empty())
        .collect();
    let subtitle = if artists.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        artists.join(", ")
    };

    let id = track
        .id
        .clone()
        .or_else(|| track.uri.clone())
        .or_else(|| track.name.clone())
        .unwrap_or_default();

    NormalizedTrack {
        id,
        title: track.name.unwrap_or_default(),
        subtitle,
        cover_url: first_image(track.album.and_then(|album| album.images)),
        uri: track.uri,
        duration_ms: track.duration_ms,
    }
}

fn to_page<T, U>(paging: Paging<T>, map: impl FnMut(T) -> Option<U>) -> Page<U> {
    let has_more = paging.next.is_some();
    let next_cursor = has_more.then(|| (paging.offset + paging.limit).to_string());
    Page::new(
        paging.items.into_iter().filter_map(map).collect(),
        next_cursor,
        has_more,
    )
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated access to the Spotify Web API.
///
/// The access token is read from the settings store on every request so a
/// reconnect takes effect without rebuilding the client.
#[derive(Clone)]
pub struct SpotifyWebApi {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn SettingsStore>,
    api_base: String,
}

impl SpotifyWebApi {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SettingsStore>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            store,
            api_base: api_base.into(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn access_token(&self) -> Result<String> {
        self.store
            .get_non_empty(keys::SPOTIFY_ACCESS_TOKEN)
            .await?
            .ok_or(LibraryError::MissingCredential {
                platform: Platform::Spotify,
            })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        let query = query
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            format!("{}{}", self.api_base, path)
        } else {
            format!("{}{}?{}", self.api_base, path, query)
        }
    }

    #[instrument(skip(self, query))]
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.access_token().await?;
        let request = HttpRequest::new(HttpMethod::Get, self.url(path, query))
            .bearer_token(token)
            .header("Accept", "application/json");

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Spotify request failed");
            return Err(LibraryError::Backend {
                platform: Platform::Spotify,
                status: response.status,
                body: readable_body(&response.text_lossy()),
            });
        }

        debug!(status = response.status, "Spotify request succeeded");
        serde_json::from_slice(&response.body).map_err(|e| LibraryError::Parse {
            platform: Platform::Spotify,
            message: e.to_string(),
        })
    }

    fn page_query(request: &PageRequest) -> Vec<(&'static str, String)> {
        vec![
            ("limit", request.limit.to_string()),
            ("offset", parse_offset(request.cursor.as_deref()).to_string()),
        ]
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Playlists and playlist tracks.
#[derive(Clone)]
pub struct SpotifyLibraryAdapter {
    api: SpotifyWebApi,
}

impl SpotifyLibraryAdapter {
    pub fn new(api: SpotifyWebApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl LibraryAdapter for SpotifyLibraryAdapter {
    async fn playlists(&self, request: PageRequest) -> Result<Page<NormalizedPlaylist>> {
        let paging: Paging<Playlist> = self
            .api
            .get_json("/me/playlists", &SpotifyWebApi::page_query(&request))
            .await?;
        Ok(to_page(paging, |playlist| Some(map_playlist(playlist))))
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        request: PageRequest,
    ) -> Result<Page<NormalizedTrack>> {
        if playlist_id.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "playlist_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let paging: Paging<TrackItem> = self
            .api
            .get_json(&path, &SpotifyWebApi::page_query(&request))
            .await?;
        Ok(to_page(paging, |item| item.track.map(map_track)))
    }
}

/// The user's saved tracks.
#[derive(Clone)]
pub struct SpotifyLikesAdapter {
    api: SpotifyWebApi,
}

impl SpotifyLikesAdapter {
    pub fn new(api: SpotifyWebApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl LikesAdapter for SpotifyLikesAdapter {
    async fn liked_tracks(&self, request: PageRequest) -> Result<Page<NormalizedTrack>> {
        let paging: Paging<TrackItem> = self
            .api
            .get_json("/me/tracks", &SpotifyWebApi::page_query(&request))
            .await?;
        Ok(to_page(paging, |item| item.track.map(map_track)))
    }
}

/// Catalog track search.
#[derive(Clone)]
pub struct SpotifySearchAdapter {
    api: SpotifyWebApi,
}

impl SpotifySearchAdapter {
    pub fn new(api: SpotifyWebApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SearchAdapter for SpotifySearchAdapter {
    async fn search_tracks(
        &self,
        query: &str,
        request: PageRequest,
    ) -> Result<Page<NormalizedTrack>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Page::empty());
        }

        let mut params = vec![("type", "track".to_string()), ("q", query.to_string())];
        params.extend(SpotifyWebApi::page_query(&request));

        let response: SearchResponse = self.api.get_json("/search", &params).await?;
        Ok(match response.tracks {
            Some(paging) => to_page(paging, |track| Some(map_track(track))),
            None => Page::empty(),
        })
    }
}
