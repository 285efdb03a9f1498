//! # Playback Coordinator
//!
//! Owns one bound [`PlaybackAdapter`], republishes its state to subscribers
//! and forwards commands to it.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --initialize()--> Initializing --connect ok--> Ready
//!       ^                              |
//!       |                        connect failed
//!       +------------------------------+
//! Ready --destroy()--> Uninitialized
//! ```
//!
//! The adapter is resolved through the [`PlatformSelector`] on first use and
//! stays bound for the coordinator's lifetime; later platform changes do not
//! swap it. A failed connect keeps the adapter subscription attached, so a
//! retried `initialize()` only reconnects.

use crate::adapters::PlaybackAdapterRegistry;
use crate::capabilities::PlaybackCapabilities;
use crate::error::Result;
use crate::listeners::{ListenerHandle, StateListener, StateListeners};
use crate::state::PlaybackState;
use crate::traits::PlaybackAdapter;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::{Platform, PlatformSelector};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    Uninitialized,
    Initializing,
    Ready,
}

/// State republished to the coordinator's own subscribers.
struct Published {
    listeners: StateListeners,
    event_bus: Option<EventBus>,
}

impl Published {
    fn publish(&self, platform: Platform, state: PlaybackState) {
        self.listeners.update(|current| {
            if let Some(bus) = &self.event_bus {
                let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::StateChanged {
                    platform,
                    is_ready: state.is_ready,
                    is_playing: state.is_playing,
                    position_ms: state.position_ms,
                    duration_ms: state.duration_ms,
                    track_id: state.track_id().map(str::to_string),
                }));
            }
            *current = state;
            true
        });
    }
}

pub struct PlaybackCoordinator {
    selector: PlatformSelector,
    registry: Arc<PlaybackAdapterRegistry>,
    adapter: Mutex<Option<Arc<dyn PlaybackAdapter>>>,
    phase: Mutex<CoordinatorPhase>,
    subscription: Mutex<Option<ListenerHandle>>,
    published: Arc<Published>,
}

impl PlaybackCoordinator {
    pub fn new(selector: PlatformSelector, registry: Arc<PlaybackAdapterRegistry>) -> Self {
        Self::build(selector, registry, None)
    }

    pub fn with_event_bus(
        selector: PlatformSelector,
        registry: Arc<PlaybackAdapterRegistry>,
        event_bus: EventBus,
    ) -> Self {
        Self::build(selector, registry, Some(event_bus))
    }

    fn build(
        selector: PlatformSelector,
        registry: Arc<PlaybackAdapterRegistry>,
        event_bus: Option<EventBus>,
    ) -> Self {
        Self {
            selector,
            registry,
            adapter: Mutex::new(None),
            phase: Mutex::new(CoordinatorPhase::Uninitialized),
            subscription: Mutex::new(None),
            published: Arc::new(Published {
                listeners: StateListeners::new(),
                event_bus,
            }),
        }
    }

    pub fn phase(&self) -> CoordinatorPhase {
        *self.phase.lock()
    }

    /// Platform of the bound adapter, once one has been resolved.
    pub fn platform(&self) -> Option<Platform> {
        self.adapter.lock().as_ref().map(|adapter| adapter.platform())
    }

    /// Capabilities of the bound adapter; nothing before one is resolved.
    pub fn capabilities(&self) -> PlaybackCapabilities {
        self.adapter
            .lock()
            .as_ref()
            .map(|adapter| adapter.capabilities())
            .unwrap_or(PlaybackCapabilities::NONE)
    }

    pub fn state(&self) -> PlaybackState {
        self.published.listeners.state()
    }

    async fn adapter(&self) -> Arc<dyn PlaybackAdapter> {
        if let Some(adapter) = self.adapter.lock().clone() {
            return adapter;
        }

        let platform = self.selector.resolve().await;
        let resolved = self.registry.resolve(platform);

        {
            let mut slot = self.adapter.lock();
            if let Some(existing) = slot.as_ref() {
                return existing.clone();
            }
            *slot = Some(resolved.clone());
        }

        info!(platform = %platform, "Playback adapter bound");
        if let Some(bus) = &self.published.event_bus {
            let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::AdapterBound { platform }));
        }
        resolved
    }

    /// Bind the adapter, subscribe to it once and connect.
    ///
    /// A call while initializing or ready is a no-op.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if *phase != CoordinatorPhase::Uninitialized {
                debug!(phase = ?*phase, "Already initialized");
                return Ok(());
            }
            *phase = CoordinatorPhase::Initializing;
        }

        let adapter = self.adapter().await;
        let platform = adapter.platform();

        let needs_subscription = self.subscription.lock().is_none();
        if needs_subscription {
            let published = self.published.clone();
            let listener: StateListener = Arc::new(move |state: &PlaybackState| {
                published.publish(platform, state.clone());
            });
            // Subscribing delivers the adapter's current state.
            let handle = adapter.on_state_change(listener);
            *self.subscription.lock() = Some(handle);
        }

        match adapter.connect().await {
            Ok(()) => {
                *self.phase.lock() = CoordinatorPhase::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Playback connect failed");
                *self.phase.lock() = CoordinatorPhase::Uninitialized;
                Err(e)
            }
        }
    }

    /// Unsubscribe, disconnect and publish the empty state.
    ///
    /// Without a bound adapter there is nothing to disconnect and this is a
    /// no-op. The state is reset even when the adapter fails to disconnect;
    /// that failure is returned afterwards.
    #[instrument(skip(self))]
    pub async fn destroy(&self) -> Result<()> {
        let subscription = self.subscription.lock().take();
        if let Some(handle) = subscription {
            handle.unsubscribe();
        }

        let bound = self.adapter.lock().clone();
        let Some(adapter) = bound else {
            debug!("No adapter bound, nothing to destroy");
            *self.phase.lock() = CoordinatorPhase::Uninitialized;
            return Ok(());
        };

        let platform = adapter.platform();
        let result = adapter.disconnect().await;
        if let Err(e) = &result {
            warn!(error = %e, "Playback disconnect failed");
        }

        *self.phase.lock() = CoordinatorPhase::Uninitialized;
        self.published.publish(platform, PlaybackState::default());

        info!(platform = %platform, "Playback coordinator destroyed");
        if let Some(bus) = &self.published.event_bus {
            let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::Destroyed { platform }));
        }
        result
    }

    pub async fn play(&self) -> Result<()> {
        self.adapter().await.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.adapter().await.pause().await
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.adapter().await.toggle_play().await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.adapter().await.seek(position_ms).await
    }

    pub async fn play_track(&self, uri: &str) -> Result<()> {
        self.adapter().await.play_track(uri).await
    }

    /// Register a listener; it receives the current state before this returns.
    pub fn on_state_change(&self, listener: StateListener) -> ListenerHandle {
        self.published.listeners.subscribe(listener)
    }
}
