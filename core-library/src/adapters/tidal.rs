//! TIDAL Open API library adapters
//!
//! The API speaks JSON:API. Collection endpoints list resource identifiers;
//! the playlists or tracks behind them are fetched in a second request, and
//! track pages then look up album covers and artist names. Cursors are the
//! opaque `page[cursor]` values handed out by the API and go back verbatim.
//! The API picks its own page size, so `PageRequest::limit` is not sent.

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
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const JSON_API: &str = "application/vnd.api+json";
const DEFAULT_LOCALE: &str = "en-US";
/// Search needs a market even when the profile has none.
const SEARCH_COUNTRY: &str = "US";
const UNKNOWN_TITLE: &str = "Unknown title";
const UNTITLED_PLAYLIST: &str = "Untitled playlist";
const IMAGE_HOST: &str = "https://resources.tidal.com/images";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Document<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    included: Option<Vec<Resource>>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    meta: Option<LinksMeta>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinksMeta {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Identifier {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Linkage {
    One(Identifier),
    Many(Vec<Identifier>),
}

impl Linkage {
    fn identifiers(&self) -> &[Identifier] {
        match self {
            Linkage::One(identifier) => std::slice::from_ref(identifier),
            Linkage::Many(identifiers) => identifiers,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Relationship {
    #[serde(default)]
    data: Option<Linkage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Resource {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    /// Shape depends on `kind`; read with [`Resource::attributes`].
    #[serde(default)]
    attributes: serde_json::Value,
    #[serde(default)]
    relationships: Option<HashMap<String, Relationship>>,
}

impl Resource {
    /// Attributes read leniently: a field of an unexpected shape is absent.
    fn attributes<A: DeserializeOwned + Default>(&self) -> A {
        serde_json::from_value(self.attributes.clone()).unwrap_or_default()
    }

    fn linkage(&self, name: &str) -> Option<&Linkage> {
        self.relationships.as_ref()?.get(name)?.data.as_ref()
    }

    fn related(&self, names: &[&str]) -> Vec<&Identifier> {
        names
            .iter()
            .filter_map(|name| self.linkage(name))
            .flat_map(Linkage::identifiers)
            .collect()
    }

    fn first_related(&self, name: &str) -> Option<&Identifier> {
        self.linkage(name)?.identifiers().first()
    }

    /// The track's album, from `albums` or else the singular `album`.
    fn album(&self) -> Option<&Identifier> {
        self.linkage("albums")
            .or_else(|| self.linkage("album"))?
            .identifiers()
            .first()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserAttributes {
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlaylistAttributes {
    name: Option<String>,
    number_of_items: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedAttributes {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EmbeddedAlbum {
    id: Option<String>,
    cover: Option<String>,
    cover_art: Option<String>,
    cover_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TrackAttributes {
    title: Option<String>,
    /// ISO 8601 duration, e.g. `PT3M25S`
    duration: Option<String>,
    artist: Option<NamedAttributes>,
    artists: Option<Vec<NamedAttributes>>,
    album: Option<EmbeddedAlbum>,
    album_id: Option<String>,
    cover: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtworkAttributes {
    files: Vec<ArtworkFile>,
}

#[derive(Debug, Deserialize)]
struct ArtworkFile {
    href: String,
    #[serde(default)]
    meta: Option<ArtworkMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtworkMeta {
    #[serde(default)]
    width: Option<u32>,
}

// ============================================================================
// Mapping
// ============================================================================

type Included = HashMap<String, Resource>;

fn resource_key(kind: &str, id: &str) -> String {
    format!("{}:{}", kind, id)
}

fn index(resources: impl IntoIterator<Item = Resource>) -> Included {
    resources
        .into_iter()
        .map(|resource| (resource_key(&resource.kind, &resource.id), resource))
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Cursor carried in the `page[cursor]` parameter of a `next` link.
fn cursor_from_next(next: &str) -> Option<String> {
    let (_, query) = next.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if urlencoding::decode(name).ok()? != "page[cursor]" {
            return None;
        }
        urlencoding::decode(value).ok().map(|value| value.into_owned())
    })
}

fn to_page<T>(items: Vec<T>, links: Option<Links>) -> Page<T> {
    let links = links.unwrap_or_default();
    let next = non_empty(links.next);
    let meta_cursor = non_empty(links.meta.and_then(|meta| meta.next_cursor));

    let has_more = next.is_some() || meta_cursor.is_some();
    let next_cursor = meta_cursor.or_else(|| next.as_deref().and_then(cursor_from_next));
    Page::new(items, next_cursor, has_more)
}

/// Milliseconds in an ISO 8601 time duration such as `PT1H2M3.5S`.
fn parse_iso_duration_ms(value: &str) -> Option<u64> {
    let components = value.strip_prefix("PT")?;
    let mut seconds = 0f64;
    let mut number = String::new();
    for c in components.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'H' | 'M' | 'S' => {
                let amount: f64 = number.parse().ok()?;
                number.clear();
                seconds += amount
                    * match c {
                        'H' => 3600.0,
                        'M' => 60.0,
                        _ => 1.0,
                    };
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some((seconds * 1000.0).round() as u64)
}

fn image_url(value: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        value.to_string()
    } else {
        format!("{}/{}/640x640.jpg", IMAGE_HOST, value.replace('-', "/"))
    }
}

/// Widest file of the referenced artwork.
fn artwork_url(artwork: Option<&Identifier>, included: &Included) -> Option<String> {
    let artwork = included.get(&resource_key("artworks", &artwork?.id))?;
    artwork
        .attributes::<ArtworkAttributes>()
        .files
        .into_iter()
        .max_by_key(|file| file.meta.as_ref().and_then(|meta| meta.width).unwrap_or(0))
        .map(|file| file.href)
}

fn artist_names(
    track: &Resource,
    included: &Included,
    artist_map: &HashMap<String, String>,
) -> Vec<String> {
    let identifiers = track.related(&["artists", "artist"]);

    let from_included: Vec<String> = identifiers
        .iter()
        .filter_map(|identifier| included.get(&resource_key("artists", &identifier.id)))
        .filter_map(|artist| non_empty(artist.attributes::<NamedAttributes>().name))
        .collect();
    if !from_included.is_empty() {
        return from_included;
    }

    let from_map: Vec<String> = identifiers
        .iter()
        .filter_map(|identifier| artist_map.get(&identifier.id).cloned())
        .collect();
    if !from_map.is_empty() {
        return from_map;
    }

    let attributes: TrackAttributes = track.attributes();
    let from_attributes: Vec<String> = attributes
        .artists
        .unwrap_or_default()
        .into_iter()
        .filter_map(|artist| non_empty(artist.name))
        .collect();
    if !from_attributes.is_empty() {
        return from_attributes;
    }

    attributes
        .artist
        .and_then(|artist| non_empty(artist.name))
        .into_iter()
        .collect()
}

fn track_cover(track: &Resource, included: &Included) -> Option<String> {
    match track.album() {
        Some(album) => {
            let album = included.get(&resource_key("albums", &album.id))?;
            artwork_url(album.first_related("coverArt"), included)
        }
        None => {
            let attributes: TrackAttributes = track.attributes();
            let album = attributes.album.unwrap_or_default();
            album
                .cover_url
                .or(album.cover_art)
                .or(album.cover)
                .or(attributes.cover)
                .or(attributes.image)
                .filter(|candidate| !candidate.is_empty())
                .map(|candidate| image_url(&candidate))
        }
    }
}

fn map_track(
    track: &Resource,
    included: &Included,
    album_covers: &HashMap<String, String>,
    artist_map: &HashMap<String, String>,
) -> NormalizedTrack {
    let artists = artist_names(track, included, artist_map);
    let subtitle = if artists.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        artists.join(", ")
    };

    let cover_url = track
        .album()
        .and_then(|album| album_covers.get(&album.id).cloned())
        .or_else(|| track_cover(track, included))
        .unwrap_or_else(|| DEFAULT_COVER.to_string());

    let attributes: TrackAttributes = track.attributes();
    NormalizedTrack {
        id: track.id.clone(),
        title: attributes
            .title
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        subtitle,
        cover_url,
        uri: Some(format!("tidal:track:{}", track.id)),
        duration_ms: attributes.duration.as_deref().and_then(parse_iso_duration_ms),
    }
}

fn map_playlist(playlist: &Resource, included: &Included) -> NormalizedPlaylist {
    let attributes: PlaylistAttributes = playlist.attributes();
    let tracks_count = attributes.number_of_items.unwrap_or(0);
    NormalizedPlaylist {
        id: playlist.id.clone(),
        title: attributes
            .name
            .unwrap_or_else(|| UNTITLED_PLAYLIST.to_string()),
        subtitle: format_track_count(tracks_count),
        cover_url: artwork_url(playlist.first_related("coverArt"), included)
            .unwrap_or_else(|| DEFAULT_COVER.to_string()),
        tracks_count,
    }
}

/// Distinct ids, first occurrence first.
fn unique(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids {
        if !id.is_empty() && !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

fn album_ids(tracks: &[Resource]) -> Vec<String> {
    unique(tracks.iter().flat_map(|track| {
        let attributes: TrackAttributes = track.attributes();
        track
            .related(&["albums", "album"])
            .into_iter()
            .map(|identifier| identifier.id.clone())
            .chain(attributes.album.and_then(|album| album.id))
            .chain(attributes.album_id)
            .collect::<Vec<_>>()
    }))
}

fn artist_ids(tracks: &[Resource]) -> Vec<String> {
    unique(tracks.iter().flat_map(|track| {
        track
            .related(&["artists", "artist"])
            .into_iter()
            .map(|identifier| identifier.id.clone())
            .collect::<Vec<_>>()
    }))
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
struct UserContext {
    user_id: String,
    country_code: Option<String>,
    locale: String,
}

type Query = Vec<(&'static str, String)>;

fn cursor_query(request: &PageRequest) -> Query {
    request
        .cursor
        .iter()
        .filter(|cursor| !cursor.is_empty())
        .map(|cursor| ("page[cursor]", cursor.clone()))
        .collect()
}

fn push_country(query: &mut Query, country: Option<&str>) {
    if let Some(country) = country {
        query.push(("countryCode", country.to_string()));
    }
}

/// Authenticated access to the TIDAL Open API.
///
/// The access token is read from the settings store on every request and
/// keeps the `tidal_session_active` marker in step with it. The user
/// profile is fetched once and cached.
#[derive(Clone)]
pub struct TidalWebApi {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn SettingsStore>,
    api_base: String,
    locale: String,
    user: Arc<Mutex<Option<UserContext>>>,
}

impl TidalWebApi {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SettingsStore>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            store,
            api_base: api_base.into(),
            locale: DEFAULT_LOCALE.to_string(),
            user: Arc::new(Mutex::new(None)),
        }
    }

    /// Locale sent with liked-track listings.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn access_token(&self) -> Result<String> {
        let token = self.store.get_non_empty(keys::TIDAL_ACCESS_TOKEN).await?;
        let marked = match &token {
            Some(_) => {
                self.store
                    .set_string(keys::TIDAL_SESSION_ACTIVE, "true")
                    .await
            }
            None => self.store.delete(keys::TIDAL_SESSION_ACTIVE).await,
        };
        if let Err(e) = marked {
            warn!(error = %e, "Failed to update TIDAL session marker");
        }

        token.ok_or(LibraryError::MissingCredential {
            platform: Platform::Tidal,
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        let query = query
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
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
            .header("Accept", JSON_API);

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "TIDAL request failed");
            return Err(LibraryError::Backend {
                platform: Platform::Tidal,
                status: response.status,
                body: readable_body(&response.text_lossy()),
            });
        }

        debug!(status = response.status, "TIDAL request succeeded");
        serde_json::from_slice(&response.body).map_err(|e| LibraryError::Parse {
            platform: Platform::Tidal,
            message: e.to_string(),
        })
    }

    async fn user_context(&self) -> Result<UserContext> {
        let cached = self.user.lock().clone();
        if let Some(user) = cached {
            return Ok(user);
        }

        let document: Document<Resource> = self.get_json("/users/me", &[]).await?;
        let user = document.data.ok_or_else(|| LibraryError::Parse {
            platform: Platform::Tidal,
            message: "user profile not available".to_string(),
        })?;

        let context = UserContext {
            country_code: user.attributes::<UserAttributes>().country,
            user_id: user.id,
            locale: self.locale.clone(),
        };
        debug!(user_id = %context.user_id, "TIDAL user profile loaded");
        *self.user.lock() = Some(context.clone());
        Ok(context)
    }

    /// Resolve a page of track identifiers into normalized tracks.
    ///
    /// Non-track identifiers are skipped, as are tracks the catalog no
    /// longer returns. Order follows the identifier list.
    async fn track_page(
        &self,
        document: Document<Vec<Identifier>>,
        country: Option<&str>,
    ) -> Result<Page<NormalizedTrack>> {
        let ids: Vec<String> = document
            .data
            .unwrap_or_default()
            .into_iter()
            .filter(|identifier| identifier.kind == "tracks")
            .map(|identifier| identifier.id)
            .collect();
        if ids.is_empty() {
            return Ok(to_page(Vec::new(), document.links));
        }

        let mut query: Query = vec![
            ("filter[id]", ids.join(",")),
            ("include", "artists,albums".to_string()),
        ];
        push_country(&mut query, country);
        let tracks: Document<Vec<Resource>> = self.get_json("/tracks", &query).await?;

        let included = index(tracks.included.unwrap_or_default());
        let by_id: HashMap<String, Resource> = tracks
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|track| (track.id.clone(), track))
            .collect();
        let ordered: Vec<Resource> = ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();

        let album_covers = self.album_covers(album_ids(&ordered), country).await?;
        let artist_map = self.artist_names(artist_ids(&ordered), country).await?;

        let items = ordered
            .iter()
            .map(|track| map_track(track, &included, &album_covers, &artist_map))
            .collect();
        Ok(to_page(items, document.links))
    }

    async fn album_covers(
        &self,
        album_ids: Vec<String>,
        country: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        if album_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: Query = vec![
            ("filter[id]", album_ids.join(",")),
            ("include", "coverArt".to_string()),
        ];
        push_country(&mut query, country);
        let albums: Document<Vec<Resource>> = self.get_json("/albums", &query).await?;

        let resources = index(
            albums
                .data
                .unwrap_or_default()
                .into_iter()
                .chain(albums.included.unwrap_or_default()),
        );
        Ok(album_ids
            .into_iter()
            .filter_map(|id| {
                let album = resources.get(&resource_key("albums", &id))?;
                let cover = artwork_url(album.first_related("coverArt"), &resources)?;
                Some((id, cover))
            })
            .collect())
    }

    async fn artist_names(
        &self,
        artist_ids: Vec<String>,
        country: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        if artist_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: Query = vec![("filter[id]", artist_ids.join(","))];
        push_country(&mut query, country);
        let artists: Document<Vec<Resource>> = self.get_json("/artists", &query).await?;

        Ok(artists
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|artist| {
                let name = non_empty(artist.attributes::<NamedAttributes>().name)?;
                Some((artist.id, name))
            })
            .collect())
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Playlists in the user's collection and their tracks.
#[derive(Clone)]
pub struct TidalLibraryAdapter {
    api: TidalWebApi,
}

impl TidalLibraryAdapter {
    pub fn new(api: TidalWebApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl LibraryAdapter for TidalLibraryAdapter {
    async fn playlists(&self, request: PageRequest) -> Result<Page<NormalizedPlaylist>> {
        let user = self.api.user_context().await?;

        let mut query = cursor_query(&request);
        query.push(("include", "playlists".to_string()));
        let path = format!(
            "/userCollections/{}/relationships/playlists",
            urlencoding::encode(&user.user_id)
        );
        let document: Document<Vec<Identifier>> = self.api.get_json(&path, &query).await?;

        let ids: Vec<String> = document
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|identifier| identifier.id)
            .collect();
        if ids.is_empty() {
            return Ok(to_page(Vec::new(), document.links));
        }

        let mut query: Query = vec![
            ("filter[id]", ids.join(",")),
            ("include", "coverArt".to_string()),
        ];
        push_country(&mut query, user.country_code.as_deref());
        let playlists: Document<Vec<Resource>> = self.api.get_json("/playlists", &query).await?;

        let included = index(playlists.included.unwrap_or_default());
        let by_id: HashMap<String, Resource> = playlists
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|playlist| (playlist.id.clone(), playlist))
            .collect();
        let items = ids
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(|playlist| map_playlist(playlist, &included))
            .collect();
        Ok(to_page(items, document.links))
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
        let user = self.api.user_context().await?;
        let country = user.country_code.as_deref();

        let mut query = cursor_query(&request);
        query.push(("include", "items".to_string()));
        push_country(&mut query, country);
        let path = format!(
            "/playlists/{}/relationships/items",
            urlencoding::encode(playlist_id)
        );
        let document: Document<Vec<Identifier>> = self.api.get_json(&path, &query).await?;
        self.api.track_page(document, country).await
    }
}

/// Tracks in the user's collection.
#[derive(Clone)]
pub struct TidalLikesAdapter {
    api: TidalWebApi,
}

impl TidalLikesAdapter {
    pub fn new(api: TidalWebApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl LikesAdapter for TidalLikesAdapter {
    async fn liked_tracks(&self, request: PageRequest) -> Result<Page<NormalizedTrack>> {
        let user = self.api.user_context().await?;
        let country = user.country_code.as_deref();

        let mut query = cursor_query(&request);
        query.push(("include", "tracks".to_string()));
        query.push(("locale", user.locale.clone()));
        push_country(&mut query, country);
        let path = format!(
            "/userCollections/{}/relationships/tracks",
            urlencoding::encode(&user.user_id)
        );
        let document: Document<Vec<Identifier>> = self.api.get_json(&path, &query).await?;
        self.api.track_page(document, country).await
    }
}

/// Catalog track search.
#[derive(Clone)]
pub struct TidalSearchAdapter {
    api: TidalWebApi,
}

impl TidalSearchAdapter {
    pub fn new(api: TidalWebApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SearchAdapter for TidalSearchAdapter {
    async fn search_tracks(
        &self,
        query: &str,
        request: PageRequest,
    ) -> Result<Page<NormalizedTrack>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Page::empty());
        }
        let user = self.api.user_context().await?;
        let country = user.country_code.as_deref();

        let mut params = cursor_query(&request);
        params.push(("include", "tracks".to_string()));
        params.push(("countryCode", country.unwrap_or(SEARCH_COUNTRY).to_string()));
        let path = format!(
            "/searchResults/{}/relationships/tracks",
            urlencoding::encode(query)
        );
        let document: Document<Vec<Identifier>> = self.api.get_json(&path, &params).await?;
        self.api.track_page(document, country).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bridge_traits::storage::MemorySettingsStore;
    use bytes::Bytes;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    const API: &str = "https://openapi.tidal.com/v2";

    const USER_NO: &str = r#"{"data": {"id": "u1", "type": "users", "attributes": {"country": "NO"}}}"#;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn store_with_token() -> Arc<MemorySettingsStore> {
        Arc::new(MemorySettingsStore::with_strings([(
            keys::TIDAL_ACCESS_TOKEN,
            "tidal-token",
        )]))
    }

    /// Serves a fixed body per path and records every requested url.
    fn routed(routes: Vec<(&'static str, &'static str)>) -> (MockHttpClient, Arc<Mutex<Vec<String>>>) {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let mut http = MockHttpClient::new();
        let log = requested.clone();
        http.expect_execute().returning(move |request| {
            assert_eq!(
                request.headers.get("Authorization").map(String::as_str),
                Some("Bearer tidal-token")
            );
            log.lock().push(request.url.clone());
            let path = request
                .url
                .strip_prefix(API)
                .and_then(|rest| rest.split('?').next())
                .unwrap_or_default()
                .to_string();
            match routes.iter().find(|(route, _)| *route == path) {
                Some((_, body)) => Ok(response(200, body)),
                None => Ok(response(404, "Not found")),
            }
        });
        (http, requested)
    }

    fn api(http: MockHttpClient, store: Arc<MemorySettingsStore>) -> TidalWebApi {
        TidalWebApi::new(Arc::new(http), store, API)
    }

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration_ms("PT4M10S"), Some(250_000));
        assert_eq!(parse_iso_duration_ms("PT1H2M3.5S"), Some(3_723_500));
        assert_eq!(parse_iso_duration_ms("PT45S"), Some(45_000));
        assert_eq!(parse_iso_duration_ms("PT"), Some(0));
        assert_eq!(parse_iso_duration_ms("3:25"), None);
        assert_eq!(parse_iso_duration_ms("PT3X"), None);
    }

    #[test]
    fn test_next_cursor_sources() {
        let page = to_page::<u8>(
            Vec::new(),
            Some(Links {
                next: Some("/x?include=tracks&page%5Bcursor%5D=from%20link".to_string()),
                meta: None,
            }),
        );
        assert_eq!(page.next_cursor.as_deref(), Some("from link"));
        assert!(page.has_more);

        let page = to_page::<u8>(
            Vec::new(),
            Some(Links {
                next: Some("/x?page[cursor]=ignored".to_string()),
                meta: Some(LinksMeta {
                    next_cursor: Some("from-meta".to_string()),
                }),
            }),
        );
        assert_eq!(page.next_cursor.as_deref(), Some("from-meta"));

        let page = to_page::<u8>(Vec::new(), None);
        assert_eq!(page.next_cursor, None);
        assert!(!page.has_more);
    }

    #[test]
    fn test_image_url() {
        assert_eq!(image_url("https://img/a.jpg"), "https://img/a.jpg");
        assert_eq!(
            image_url("ab12-cd34"),
            "https://resources.tidal.com/images/ab12/cd34/640x640.jpg"
        );
    }

    #[tokio::test]
    async fn test_playlists_keep_collection_order() {
        let (http, requested) = routed(vec![
            ("/users/me", USER_NO),
            (
                "/userCollections/u1/relationships/playlists",
                r#"{
                    "data": [{"id": "p2", "type": "playlists"}, {"id": "p1", "type": "playlists"}],
                    "links": {"next": "/userCollections/u1/relationships/playlists?page%5Bcursor%5D=abc", "meta": {"nextCursor": "abc"}}
                }"#,
            ),
            (
                "/playlists",
                r#"{
                    "data": [
                        {"id": "p1", "type": "playlists", "attributes": {"name": "Mix", "numberOfItems": 1},
                         "relationships": {"coverArt": {"data": [{"id": "a1", "type": "artworks"}]}}},
                        {"id": "p2", "type": "playlists", "attributes": {"numberOfItems": 3}}
                    ],
                    "included": [
                        {"id": "a1", "type": "artworks", "attributes": {"files": [
                            {"href": "https://img/a1-80", "meta": {"width": 80}},
                            {"href": "https://img/a1-640", "meta": {"width": 640}}
                        ]}}
                    ]
                }"#,
            ),
        ]);

        let adapter = TidalLibraryAdapter::new(api(http, store_with_token()));
        let page = adapter.playlists(PageRequest::first(20)).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "p2");
        assert_eq!(page.items[0].title, "Untitled playlist");
        assert_eq!(page.items[0].subtitle, "3 songs");
        assert_eq!(page.items[0].cover_url, DEFAULT_COVER);
        assert_eq!(page.items[1].title, "Mix");
        assert_eq!(page.items[1].subtitle, "1 song");
        assert_eq!(page.items[1].cover_url, "https://img/a1-640");
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
        assert!(page.has_more);

        adapter
            .playlists(PageRequest::new(20, Some("abc".to_string())))
            .await
            .unwrap();

        let requested = requested.lock();
        assert_eq!(
            requested[1],
            format!("{}/userCollections/u1/relationships/playlists?include=playlists", API)
        );
        assert_eq!(
            requested[2],
            format!(
                "{}/playlists?filter%5Bid%5D=p2%2Cp1&include=coverArt&countryCode=NO",
                API
            )
        );
        assert_eq!(
            requested[3],
            format!(
                "{}/userCollections/u1/relationships/playlists?page%5Bcursor%5D=abc&include=playlists",
                API
            )
        );
        let profile_loads = requested.iter().filter(|url| url.ends_with("/users/me")).count();
        assert_eq!(profile_loads, 1);
    }

    #[tokio::test]
    async fn test_playlist_tracks_resolve_artists_and_covers() {
        let (http, requested) = routed(vec![
            ("/users/me", USER_NO),
            (
                "/playlists/pl1/relationships/items",
                r#"{"data": [
                    {"id": "t1", "type": "tracks"},
                    {"id": "v1", "type": "videos"},
                    {"id": "t2", "type": "tracks"},
                    {"id": "gone", "type": "tracks"}
                ]}"#,
            ),
            (
                "/tracks",
                r#"{
                    "data": [
                        {"id": "t1", "type": "tracks",
                         "attributes": {"title": "Runaway", "duration": "PT4M10S"},
                         "relationships": {
                            "artists": {"data": [{"id": "ar1", "type": "artists"}, {"id": "ar2", "type": "artists"}]},
                            "albums": {"data": [{"id": "al1", "type": "albums"}]}
                         }},
                        {"id": "t2", "type": "tracks",
                         "attributes": {"duration": "PT1H2M3.5S", "artists": [{"name": "X"}], "album": {"cover": "ab-cd"}}}
                    ],
                    "included": [
                        {"id": "ar1", "type": "artists", "attributes": {"name": "Aurora"}}
                    ]
                }"#,
            ),
            (
                "/albums",
                r#"{
                    "data": [{"id": "al1", "type": "albums",
                              "relationships": {"coverArt": {"data": [{"id": "aw1", "type": "artworks"}]}}}],
                    "included": [{"id": "aw1", "type": "artworks",
                                  "attributes": {"files": [{"href": "https://img/al1", "meta": {"width": 320}}]}}]
                }"#,
            ),
            (
                "/artists",
                r#"{"data": [{"id": "ar1", "type": "artists", "attributes": {"name": "Aurora"}}]}"#,
            ),
        ]);

        let adapter = TidalLibraryAdapter::new(api(http, store_with_token()));
        let page = adapter
            .playlist_tracks("pl1", PageRequest::first(50))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        let first = &page.items[0];
        assert_eq!(first.id, "t1");
        assert_eq!(first.title, "Runaway");
        assert_eq!(first.subtitle, "Aurora");
        assert_eq!(first.cover_url, "https://img/al1");
        assert_eq!(first.uri.as_deref(), Some("tidal:track:t1"));
        assert_eq!(first.duration_ms, Some(250_000));

        let second = &page.items[1];
        assert_eq!(second.title, "Unknown title");
        assert_eq!(second.subtitle, "X");
        assert_eq!(
            second.cover_url,
            "https://resources.tidal.com/images/ab/cd/640x640.jpg"
        );
        assert_eq!(second.duration_ms, Some(3_723_500));
        assert_eq!(page.next_cursor, None);
        assert!(!page.has_more);

        let requested = requested.lock();
        assert!(requested.contains(&format!(
            "{}/tracks?filter%5Bid%5D=t1%2Ct2%2Cgone&include=artists%2Calbums&countryCode=NO",
            API
        )));
        assert!(requested.contains(&format!(
            "{}/artists?filter%5Bid%5D=ar1%2Car2&countryCode=NO",
            API
        )));
    }

    #[tokio::test]
    async fn test_liked_tracks_pass_cursor_through() {
        let (http, requested) = routed(vec![
            ("/users/me", USER_NO),
            (
                "/userCollections/u1/relationships/tracks",
                r#"{"data": [], "links": {"meta": {"nextCursor": "n2"}}}"#,
            ),
        ]);

        let adapter = TidalLikesAdapter::new(api(http, store_with_token()));
        let page = adapter
            .liked_tracks(PageRequest::new(50, Some("n1".to_string())))
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor.as_deref(), Some("n2"));
        assert!(page.has_more);
        assert_eq!(
            requested.lock()[1],
            format!(
                "{}/userCollections/u1/relationships/tracks?page%5Bcursor%5D=n1&include=tracks&locale=en-US&countryCode=NO",
                API
            )
        );
    }

    #[tokio::test]
    async fn test_search_defaults_country() {
        let (http, requested) = routed(vec![
            ("/users/me", r#"{"data": {"id": "u1", "type": "users"}}"#),
            ("/searchResults/daft%20punk/relationships/tracks", r#"{"data": []}"#),
        ]);

        let adapter = TidalSearchAdapter::new(api(http, store_with_token()));
        let page = adapter
            .search_tracks("  daft punk ", PageRequest::first(50))
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert!(!page.has_more);
        let requested = requested.lock();
        assert_eq!(requested.len(), 2);
        assert_eq!(
            requested[1],
            format!(
                "{}/searchResults/daft%20punk/relationships/tracks?include=tracks&countryCode=US",
                API
            )
        );
    }

    #[tokio::test]
    async fn test_blank_search_is_empty_without_request() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let adapter = TidalSearchAdapter::new(api(http, store_with_token()));
        let page = adapter
            .search_tracks("  ", PageRequest::first(50))
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_missing_token_clears_session_marker() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);
        let store = Arc::new(MemorySettingsStore::with_strings([(
            keys::TIDAL_SESSION_ACTIVE,
            "true",
        )]));

        let adapter = TidalLikesAdapter::new(api(http, store.clone()));
        let err = adapter
            .liked_tracks(PageRequest::first(50))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Missing TIDAL access token. Please reconnect to TIDAL."
        );
        assert!(!store.has_key(keys::TIDAL_SESSION_ACTIVE).await.unwrap());
    }

    #[tokio::test]
    async fn test_token_marks_session_active() {
        let (http, _) = routed(vec![("/users/me", USER_NO)]);
        let store = store_with_token();

        let adapter = TidalLibraryAdapter::new(api(http, store.clone()));
        let _ = adapter.playlists(PageRequest::first(20)).await;

        assert_eq!(
            store
                .get_string(keys::TIDAL_SESSION_ACTIVE)
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_backend_error_message() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(500, "Service down")));

        let adapter = TidalLibraryAdapter::new(api(http, store_with_token()));
        let err = adapter.playlists(PageRequest::first(20)).await.unwrap_err();

        assert_eq!(err.to_string(), "TIDAL request failed (500). Service down");
    }
}
