//! Host player seam
//!
//! The danmaku engine never drives playback. It reads the clock, viewport and
//! playing flag from a `PlayerHost` and reacts to the host's lifecycle events:
//! - `events`: event kinds, synchronous `EventBus`, RAII `Subscription`
//! - `simulated`: clock-stepped host used by the replay tool and tests

pub mod events;
pub mod simulated;

pub use events::{EventBus, EventHandler, ListenerId, PlayerEventKind, Subscription};
pub use simulated::SimulatedPlayer;

/// Size of the video surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportRect {
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// What the engine needs from the player it is attached to
pub trait PlayerHost: Send + Sync {
    /// Register `handler` for `kind`
    fn subscribe(&self, kind: PlayerEventKind, handler: EventHandler) -> ListenerId;

    /// Remove a listener; unknown ids are ignored
    fn unsubscribe(&self, kind: PlayerEventKind, id: ListenerId) -> bool;

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    fn rect(&self) -> ViewportRect;

    /// Actively playing (not paused, not ended)
    fn is_playing(&self) -> bool;
}
