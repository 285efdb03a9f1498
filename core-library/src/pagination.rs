//! Cursor pagination types shared by adapters and page caches

use serde::{Deserialize, Serialize};

/// Page size for playlist listings
pub const PLAYLISTS_PAGE_SIZE: u32 = 20;
/// Page size for playlist tracks
pub const TRACKS_PAGE_SIZE: u32 = 50;
/// Page size for liked tracks
pub const LIKES_PAGE_SIZE: u32 = 50;
/// Page size for search results
pub const SEARCH_PAGE_SIZE: u32 = 50;
/// Upper bound on pages fetched by one `load_all`
pub const LOAD_ALL_MAX_PAGES: usize = 200;

/// Pagination request parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Number of items to fetch
    pub limit: u32,
    /// Opaque token from the previous page; `None` for the first page
    pub cursor: Option<String>,
}

impl PageRequest {
    /// Create a new page request
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::pagination::PageRequest;
    ///
    /// let request = PageRequest::new(20, Some("40".to_string()));
    /// assert_eq!(request.limit, 20);
    /// assert_eq!(request.cursor.as_deref(), Some("40"));
    /// ```
    pub fn new(limit: u32, cursor: Option<String>) -> Self {
        Self { limit, cursor }
    }

    /// Request for the first page
    pub fn first(limit: u32) -> Self {
        Self::new(limit, None)
    }
}

/// One page returned by an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Cursor for the following page, passed back verbatim
    pub next_cursor: Option<String>,
    /// Whether another page exists
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor,
            has_more,
        }
    }

    /// A terminal page with no items
    pub fn empty() -> Self {
        Self::new(Vec::new(), None, false)
    }

    /// Map the items to a different type
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

/// Accumulated pages for one resource key
///
/// `items` only grows by append. A failed fetch sets `error` and leaves
/// `items` and `cursor` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for PageState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            has_more: true,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> PageState<T> {
    /// Whether a fetch would be issued for this state
    pub fn can_load_more(&self) -> bool {
        !self.is_loading && self.has_more
    }

    /// Append a fetched page and adopt its cursor
    pub fn merge(&mut self, page: Page<T>) {
        self.items.extend(page.items);
        self.cursor = page.next_cursor;
        self.has_more = page.has_more;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_state_default() {
        let state: PageState<u32> = PageState::default();
        assert!(state.items.is_empty());
        assert_eq!(state.cursor, None);
        assert!(state.has_more);
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert!(state.can_load_more());
    }

    #[test]
    fn test_merge_appends_and_adopts_cursor() {
        let mut state = PageState::default();
        state.merge(Page::new(vec![1, 2], Some("2".to_string()), true));
        state.merge(Page::new(vec![3], None, false));

        assert_eq!(state.items, vec![1, 2, 3]);
        assert_eq!(state.cursor, None);
        assert!(!state.has_more);
        assert!(!state.can_load_more());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![1, 2, 3], Some("3".to_string()), true);
        let mapped = page.map(|x| x * 2);

        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert_eq!(mapped.next_cursor.as_deref(), Some("3"));
        assert!(mapped.has_more);
    }

    #[test]
    fn test_empty_page_is_terminal() {
        let page: Page<u32> = Page::empty();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_page_state_serializes_camel_case() {
        let state: PageState<u32> = PageState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["isLoading"], false);
    }
}
