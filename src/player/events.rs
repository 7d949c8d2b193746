//! Player lifecycle events
//!
//! - `PlayerEventKind` - the events a host player emits
//! - `EventBus` - synchronous listener registry a host can embed
//! - `Subscription` - RAII handle that unsubscribes its listeners on drop
//!
//! ## Dispatch
//! ```text
//! Host --emit(kind)--> EventBus --snapshot handlers, release lock--> handler(kind)
//! ```
//! Handlers run on the emitting thread, after the bus lock is released, so a
//! handler may subscribe or unsubscribe without deadlocking.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::PlayerHost;

/// Lifecycle events consumed by the danmaku engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEventKind {
    /// Playback clock moved
    TimeUpdate,
    /// Playback paused
    Pause,
    /// Playback reached the end of the media
    Ended,
    /// Player attached to its surface; viewport size is now known
    Mounted,
}

impl PlayerEventKind {
    pub fn name(self) -> &'static str {
        match self {
            PlayerEventKind::TimeUpdate => "time-update",
            PlayerEventKind::Pause => "pause",
            PlayerEventKind::Ended => "ended",
            PlayerEventKind::Mounted => "mounted",
        }
    }
}

impl std::fmt::Display for PlayerEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Event callback registered with a host
pub type EventHandler = Arc<dyn Fn(PlayerEventKind) + Send + Sync>;

/// Identifies one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(ListenerId, PlayerEventKind, EventHandler)>,
}

/// Synchronous event dispatcher
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: PlayerEventKind, handler: EventHandler) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, kind, handler));
        id
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn off(&self, kind: PlayerEventKind, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner
            .listeners
            .retain(|(lid, lkind, _)| !(*lid == id && *lkind == kind));
        inner.listeners.len() != before
    }

    /// Invoke every listener of `kind`, returns how many ran
    pub fn emit(&self, kind: PlayerEventKind) -> usize {
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.lock();
            inner
                .listeners
                .iter()
                .filter(|(_, lkind, _)| *lkind == kind)
                .map(|(_, _, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in &handlers {
            handler(kind);
        }
        handlers.len()
    }

    pub fn listener_count(&self, kind: PlayerEventKind) -> usize {
        self.inner
            .lock()
            .listeners
            .iter()
            .filter(|(_, lkind, _)| *lkind == kind)
            .count()
    }
}

/// Listeners registered on a host, removed when the handle is cancelled or dropped
///
/// Holds the host weakly so a subscription never keeps a torn-down player alive.
pub struct Subscription {
    host: Weak<dyn PlayerHost>,
    listeners: Vec<(PlayerEventKind, ListenerId)>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn new(host: &Arc<dyn PlayerHost>) -> Self {
        Self {
            host: Arc::downgrade(host),
            listeners: Vec::new(),
        }
    }

    /// Register `handler` for `kind` on the host
    pub fn listen(&mut self, kind: PlayerEventKind, handler: EventHandler) {
        if let Some(host) = self.host.upgrade() {
            let id = host.subscribe(kind, handler);
            self.listeners.push((kind, id));
        }
    }

    /// Unsubscribe every listener; safe to call repeatedly
    pub fn cancel(&mut self) {
        let listeners = std::mem::take(&mut self.listeners);
        if let Some(host) = self.host.upgrade() {
            for (kind, id) in listeners {
                host.unsubscribe(kind, id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.listeners.is_empty()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
