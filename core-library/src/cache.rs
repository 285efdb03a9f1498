//! Generic cursor pagination cache
//!
//! A [`PageCache`] accumulates pages per resource key. Fetching is supplied
//! by the caller as a closure so the same engine serves playlists, playlist
//! tracks, liked tracks and search results.
//!
//! Concurrent `load_next_page` calls for a key are coalesced: while one fetch
//! is in flight, further calls return the current state without fetching.
//! Every key slot carries a generation; a fetch whose slot was reset while it
//! was in flight has its result discarded when it completes.

use crate::error::Result;
use crate::pagination::{Page, PageRequest, PageState, LOAD_ALL_MAX_PAGES};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

struct Slot<T> {
    state: PageState<T>,
    generation: u64,
}

struct CacheInner<T> {
    slots: HashMap<String, Slot<T>>,
    next_generation: u64,
}

impl<T> CacheInner<T> {
    fn slot(&mut self, key: &str) -> &mut Slot<T> {
        let generation = self.next_generation;
        let slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            state: PageState::default(),
            generation,
        });
        if slot.generation == generation {
            self.next_generation += 1;
        }
        slot
    }

    /// The slot for `key`, only if it has not been reset since `generation`.
    fn current(&mut self, key: &str, generation: u64) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(key)
            .filter(|slot| slot.generation == generation)
    }
}

pub struct PageCache<T> {
    resource: &'static str,
    page_size: u32,
    default_error: &'static str,
    inner: Mutex<CacheInner<T>>,
    event_bus: Option<EventBus>,
}

/// Clears `is_loading` if a fetch is dropped before it completes.
struct LoadingGuard<'a, T> {
    cache: &'a PageCache<T>,
    key: &'a str,
    generation: u64,
    armed: bool,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.cache.inner.lock();
        if let Some(slot) = inner.current(self.key, self.generation) {
            slot.state.is_loading = false;
        }
    }
}

impl<T: Clone> PageCache<T> {
    pub fn new(resource: &'static str, page_size: u32, default_error: &'static str) -> Self {
        Self {
            resource,
            page_size,
            default_error,
            inner: Mutex::new(CacheInner {
                slots: HashMap::new(),
                next_generation: 0,
            }),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Snapshot of the state for `key`, created empty on first access.
    ///
    /// Never triggers a fetch.
    pub fn state(&self, key: &str) -> PageState<T> {
        self.inner.lock().slot(key).state.clone()
    }

    /// Fetch and append the next page for `key`.
    ///
    /// Returns the state unchanged when a fetch is already running or no
    /// further page exists. Fetch failures are stored on `error` and never
    /// returned to the caller.
    pub async fn load_next_page<F, Fut>(&self, key: &str, fetch: F) -> PageState<T>
    where
        F: FnOnce(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let (request, generation) = {
            let mut inner = self.inner.lock();
            let slot = inner.slot(key);
            if !slot.state.can_load_more() {
                return slot.state.clone();
            }
            slot.state.is_loading = true;
            slot.state.error = None;
            (
                PageRequest::new(self.page_size, slot.state.cursor.clone()),
                slot.generation,
            )
        };

        let mut guard = LoadingGuard {
            cache: self,
            key,
            generation,
            armed: true,
        };

        let result = fetch(request).await;
        guard.armed = false;

        let mut inner = self.inner.lock();
        let Some(slot) = inner.current(key, generation) else {
            debug!(resource = self.resource, key, "Discarding page fetched before reset");
            return inner.slot(key).state.clone();
        };

        let state = &mut slot.state;
        state.is_loading = false;

        let event = match result {
            Ok(page) => {
                state.merge(page);
                debug!(
                    resource = self.resource,
                    key,
                    total_items = state.items.len(),
                    has_more = state.has_more,
                    "Page loaded"
                );
                LibraryEvent::PageLoaded {
                    resource: self.resource.to_string(),
                    key: key.to_string(),
                    total_items: state.items.len(),
                    has_more: state.has_more,
                }
            }
            Err(e) => {
                let mut message = e.to_string();
                if message.trim().is_empty() {
                    message = self.default_error.to_string();
                }
                warn!(resource = self.resource, key, error = %message, "Page fetch failed");
                state.error = Some(message.clone());
                LibraryEvent::PageFailed {
                    resource: self.resource.to_string(),
                    key: key.to_string(),
                    message,
                }
            }
        };

        let snapshot = state.clone();
        drop(inner);

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Library(event));
        }
        snapshot
    }

    /// Load pages until none remain.
    ///
    /// Stops early when a page adds no items (an error or an adapter that
    /// keeps reporting more without progressing) or after
    /// [`LOAD_ALL_MAX_PAGES`] iterations, returning whatever accumulated.
    pub async fn load_all<F, Fut>(&self, key: &str, fetch: F) -> PageState<T>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut state = self.state(key);
        let mut iterations = 0usize;

        while state.has_more {
            let before = state.items.len();
            state = self.load_next_page(key, &fetch).await;

            if state.items.len() == before {
                debug!(resource = self.resource, key, "load_all stalled");
                break;
            }

            iterations += 1;
            if iterations >= LOAD_ALL_MAX_PAGES {
                warn!(
                    resource = self.resource,
                    key,
                    iterations,
                    "load_all hit the page limit"
                );
                break;
            }
        }

        state
    }

    /// Drop the state for one key.
    pub fn reset(&self, key: &str) {
        self.inner.lock().slots.remove(key);
    }

    /// Drop every key, discarding fetches still in flight.
    pub fn reset_all(&self) {
        self.inner.lock().slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    fn cache() -> PageCache<u32> {
        PageCache::new("numbers", 2, "Unexpected error while loading numbers.")
    }

    fn page_of(start: u32, count: u32, total: u32) -> Page<u32> {
        let end = (start + count).min(total);
        let has_more = end < total;
        Page::new(
            (start..end).collect(),
            has_more.then(|| end.to_string()),
            has_more,
        )
    }

    fn offset(request: &PageRequest) -> u32 {
        request
            .cursor
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_state_is_created_lazily_without_fetch() {
        let cache = cache();
        let state = cache.state("a");
        assert!(state.items.is_empty());
        assert!(state.has_more);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_load_next_page_appends_and_passes_cursor() {
        let cache = cache();

        let state = cache
            .load_next_page("a", |request| async move {
                assert_eq!(request.limit, 2);
                assert_eq!(request.cursor, None);
                Ok(page_of(0, 2, 3))
            })
            .await;
        assert_eq!(state.items, vec![0, 1]);
        assert_eq!(state.cursor.as_deref(), Some("2"));

        let state = cache
            .load_next_page("a", |request| async move {
                assert_eq!(request.cursor.as_deref(), Some("2"));
                Ok(page_of(offset(&request), 2, 3))
            })
            .await;
        assert_eq!(state.items, vec![0, 1, 2]);
        assert!(!state.has_more);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_no_fetch_when_exhausted() {
        let cache = cache();
        cache
            .load_next_page("a", |_| async { Ok(page_of(0, 2, 1)) })
            .await;

        let calls = AtomicUsize::new(0);
        let state = cache
            .load_next_page("a", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(page_of(0, 2, 1)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.items, vec![0]);
    }

    #[tokio::test]
    async fn test_concurrent_load_is_coalesced() {
        let cache = Arc::new(cache());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .load_next_page("a", |_| async move {
                        let _ = release_rx.await;
                        Ok(page_of(0, 2, 4))
                    })
                    .await
            })
        };

        while !cache.state("a").is_loading {
            tokio::task::yield_now().await;
        }

        let calls = AtomicUsize::new(0);
        let state = cache
            .load_next_page("a", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(page_of(0, 2, 4)) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(state.is_loading);
        assert!(state.items.is_empty());

        let _ = release_tx.send(());
        let state = first.await.unwrap();
        assert_eq!(state.items, vec![0, 1]);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_failure_keeps_items_and_cursor() {
        let cache = cache();
        cache
            .load_next_page("a", |_| async { Ok(page_of(0, 2, 4)) })
            .await;

        let state = cache
            .load_next_page("a", |_| async {
                Err(LibraryError::Unavailable {
                    message: "Tidal user library is not available yet.".to_string(),
                })
            })
            .await;

        assert_eq!(state.items, vec![0, 1]);
        assert_eq!(state.cursor.as_deref(), Some("2"));
        assert!(state.has_more);
        assert!(!state.is_loading);
        assert_eq!(
            state.error.as_deref(),
            Some("Tidal user library is not available yet.")
        );

        let state = cache
            .load_next_page("a", |request| async move { Ok(page_of(offset(&request), 2, 4)) })
            .await;
        assert_eq!(state.items, vec![0, 1, 2, 3]);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_empty_error_message_uses_default() {
        let cache = cache();
        let state = cache
            .load_next_page("a", |_| async {
                Err(LibraryError::Unavailable {
                    message: String::new(),
                })
            })
            .await;
        assert_eq!(
            state.error.as_deref(),
            Some("Unexpected error while loading numbers.")
        );
    }

    #[tokio::test]
    async fn test_load_all_collects_every_page() {
        let cache = cache();
        let state = cache
            .load_all("a", |request| async move { Ok(page_of(offset(&request), 2, 7)) })
            .await;
        assert_eq!(state.items, (0..7).collect::<Vec<_>>());
        assert!(!state.has_more);
    }

    #[tokio::test]
    async fn test_load_all_stops_on_stall() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let state = cache
            .load_all("a", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Page::new(Vec::new(), Some("0".to_string()), true)) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn test_load_all_is_capped() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let state = cache
            .load_all("a", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                async move { Ok(Page::new(vec![n], Some("next".to_string()), true)) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), LOAD_ALL_MAX_PAGES);
        assert_eq!(state.items.len(), LOAD_ALL_MAX_PAGES);
        assert!(state.has_more);
    }

    #[tokio::test]
    async fn test_result_after_reset_is_discarded() {
        let cache = Arc::new(cache());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .load_next_page("a", |_| async move {
                        let _ = release_rx.await;
                        Ok(page_of(0, 2, 4))
                    })
                    .await
            })
        };

        while !cache.state("a").is_loading {
            tokio::task::yield_now().await;
        }
        cache.reset_all();
        let _ = release_tx.send(());

        let state = pending.await.unwrap();
        assert!(state.items.is_empty());
        assert!(!state.is_loading);
        assert!(cache.state("a").items.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_clears_loading() {
        let cache = cache();
        {
            let fut = cache.load_next_page("a", |_| std::future::pending());
            tokio::pin!(fut);
            let _ = tokio::time::timeout(std::time::Duration::from_millis(10), &mut fut).await;
        }
        assert!(!cache.state("a").is_loading);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let cache = cache().with_event_bus(bus);

        cache
            .load_next_page("a", |_| async { Ok(page_of(0, 2, 4)) })
            .await;

        match rx.recv().await.unwrap() {
            CoreEvent::Library(LibraryEvent::PageLoaded {
                resource,
                total_items,
                has_more,
                ..
            }) => {
                assert_eq!(resource, "numbers");
                assert_eq!(total_items, 2);
                assert!(has_more);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
