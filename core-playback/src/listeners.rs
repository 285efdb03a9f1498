//! State-change listener hub
//!
//! The hub owns the current [`PlaybackState`] together with its listeners.
//! Replacing the state and snapshotting the listener list happen under one
//! lock, as do reading the state and registering a new listener, so a
//! subscriber never starts from a state older than one it was not sent.
//! Deliveries are serialized in the order the states were set.

use crate::state::PlaybackState;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback invoked with every new playback state.
pub type StateListener = Arc<dyn Fn(&PlaybackState) + Send + Sync>;

type ListenerMap = Mutex<ListenerSlots>;

#[derive(Default)]
struct ListenerSlots {
    state: PlaybackState,
    next_id: u64,
    listeners: BTreeMap<u64, StateListener>,
}

/// Current state plus registered listeners, notified in registration order.
#[derive(Clone, Default)]
pub struct StateListeners {
    slots: Arc<ListenerMap>,
    /// Held while callbacks run; re-entrant so a callback may subscribe.
    delivery: Arc<ReentrantMutex<()>>,
}

impl StateListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.slots.lock().state.clone()
    }

    /// Register `listener` and deliver the current state to it immediately.
    pub fn subscribe(&self, listener: StateListener) -> ListenerHandle {
        let _delivery = self.delivery.lock();
        let (id, current) = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.insert(id, listener.clone());
            (id, slots.state.clone())
        };

        listener(&current);

        ListenerHandle {
            registration: Some((Arc::downgrade(&self.slots), id)),
        }
    }

    /// Replace the state and deliver it to every listener.
    pub fn publish(&self, state: PlaybackState) {
        self.update(|current| {
            *current = state;
            true
        });
    }

    /// Edit the state in place; `edit` returns whether anything changed.
    ///
    /// Listeners run outside the state lock, so they may read the state or
    /// unsubscribe from inside the callback. Returns whether a new state
    /// was delivered.
    pub fn update(&self, edit: impl FnOnce(&mut PlaybackState) -> bool) -> bool {
        let _delivery = self.delivery.lock();
        let (state, listeners) = {
            let mut slots = self.slots.lock();
            if !edit(&mut slots.state) {
                return false;
            }
            let listeners: Vec<StateListener> = slots.listeners.values().cloned().collect();
            (slots.state.clone(), listeners)
        };

        for listener in listeners {
            listener(&state);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.slots.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for StateListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateListeners")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Registration returned by `on_state_change`.
///
/// Dropping the handle keeps the listener registered; call
/// [`ListenerHandle::unsubscribe`] to remove it.
#[derive(Debug, Default)]
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct ListenerHandle {
    registration: Option<(Weak<ListenerMap>, u64)>,
}

impl ListenerHandle {
    /// A handle that is not attached to anything.
    pub fn inert() -> Self {
        Self::default()
    }

    pub fn is_inert(&self) -> bool {
        self.registration.is_none()
    }

    pub fn unsubscribe(self) {
        if let Some((slots, id)) = self.registration {
            if let Some(slots) = slots.upgrade() {
                slots.lock().listeners.remove(&id);
            }
        }
    }
}
