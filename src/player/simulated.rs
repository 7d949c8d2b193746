//! Simulated player
//!
//! A `PlayerHost` whose clock is stepped by hand. Playback state lives behind
//! a `RwLock` so reads never block each other; every mutation releases the
//! lock before the matching event is emitted, so handlers can read the state
//! they were notified about.

use parking_lot::RwLock;

use super::events::{EventBus, EventHandler, ListenerId, PlayerEventKind};
use super::{PlayerHost, ViewportRect};

#[derive(Debug, Clone, Copy)]
struct SimulatedState {
    time: f64,
    playing: bool,
    rect: ViewportRect,
}

#[derive(Debug)]
pub struct SimulatedPlayer {
    state: RwLock<SimulatedState>,
    bus: EventBus,
}

impl SimulatedPlayer {
    /// Create a paused player at time 0
    pub fn new(rect: ViewportRect) -> Self {
        Self {
            state: RwLock::new(SimulatedState {
                time: 0.0,
                playing: false,
                rect,
            }),
            bus: EventBus::new(),
        }
    }

    pub fn play(&self) {
        self.state.write().playing = true;
    }

    /// Stop the clock and emit `pause`
    pub fn pause(&self) {
        self.state.write().playing = false;
        self.bus.emit(PlayerEventKind::Pause);
    }

    /// Stop the clock and emit `ended`
    pub fn end(&self) {
        self.state.write().playing = false;
        self.bus.emit(PlayerEventKind::Ended);
    }

    /// Jump the clock to `time` and emit `time-update`
    pub fn set_time(&self, time: f64) {
        self.state.write().time = time;
        self.bus.emit(PlayerEventKind::TimeUpdate);
    }

    /// Move the clock forward by `delta` seconds if playing
    ///
    /// Returns the new playback time.
    pub fn tick(&self, delta: f64) -> f64 {
        let time = {
            let mut state = self.state.write();
            if state.playing {
                state.time += delta;
            }
            state.time
        };
        self.bus.emit(PlayerEventKind::TimeUpdate);
        time
    }

    pub fn resize(&self, rect: ViewportRect) {
        self.state.write().rect = rect;
    }

    /// Emit `mounted`
    pub fn mount(&self) {
        self.bus.emit(PlayerEventKind::Mounted);
    }

    pub fn listener_count(&self, kind: PlayerEventKind) -> usize {
        self.bus.listener_count(kind)
    }
}

impl PlayerHost for SimulatedPlayer {
    fn subscribe(&self, kind: PlayerEventKind, handler: EventHandler) -> ListenerId {
        self.bus.on(kind, handler)
    }

    fn unsubscribe(&self, kind: PlayerEventKind, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    fn current_time(&self) -> f64 {
        self.state.read().time
    }

    fn rect(&self) -> ViewportRect {
        self.state.read().rect
    }

    fn is_playing(&self) -> bool {
        self.state.read().playing
    }
}
