//! Offline replay
//!
//! Drives a `Danmaku` controller with a `SimulatedPlayer` whose clock is
//! stepped at a fixed rate, and collects what the scheduler did.

use std::sync::Arc;

use crate::danmaku::{CommentItem, Danmaku, DanmakuOverrides};
use crate::player::{PlayerHost, SimulatedPlayer, ViewportRect};

/// Smallest clock step accepted; smaller values are raised to it
pub const MIN_STEP: f64 = 0.01;

/// Seconds replayed past the last comment when no end time is given
pub const TAIL_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayConfig {
    pub viewport: ViewportRect,
    /// Clock step in seconds, one time-update per step
    pub step: f64,
    /// Stop time; defaults to the last comment time plus `TAIL_SECONDS`
    pub until: Option<f64>,
    /// Pause playback for one step when the clock first reaches this time
    pub pause_at: Option<f64>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportRect::new(1280.0, 720.0),
            step: 0.25,
            until: None,
            pause_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplaySummary {
    pub comments: usize,
    pub ticks: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub missed: u64,
    pub discarded: u64,
    /// Most bullets alive after any tick
    pub peak_alive: usize,
    /// Bullet slots ever allocated
    pub pool_capacity: usize,
    pub lane_count: usize,
    pub end_time: f64,
}

impl std::fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "comments:   {}", self.comments)?;
        writeln!(f, "ticks:      {} (until {:.2}s)", self.ticks, self.end_time)?;
        writeln!(f, "lanes:      {}", self.lane_count)?;
        writeln!(f, "accepted:   {}", self.accepted)?;
        writeln!(f, "rejected:   {}", self.rejected)?;
        writeln!(f, "missed:     {}", self.missed)?;
        writeln!(f, "discarded:  {}", self.discarded)?;
        writeln!(f, "peak alive: {}", self.peak_alive)?;
        write!(f, "pool size:  {}", self.pool_capacity)
    }
}

/// Replay `items` from time 0 and summarize the scheduler's decisions
pub fn run_replay(
    items: Vec<CommentItem>,
    overrides: DanmakuOverrides,
    config: &ReplayConfig,
) -> ReplaySummary {
    let step = config.step.max(MIN_STEP);
    let last = items.iter().map(|item| item.time).fold(0.0, f64::max);
    let until = config.until.unwrap_or(last + TAIL_SECONDS);
    let comments = items.len();

    let player = Arc::new(SimulatedPlayer::new(config.viewport));
    let host: Arc<dyn PlayerHost> = player.clone();
    let danmaku = Danmaku::new(host, overrides);
    danmaku.lock().reset_items(items);
    player.mount();
    player.play();

    let mut ticks = 0;
    let mut peak_alive = 0;
    let mut pause_at = config.pause_at;
    let mut time = 0.0;
    player.set_time(time);

    while time < until {
        if pause_at.is_some_and(|at| time >= at) {
            pause_at = None;
            tracing::debug!("Pausing replay at {:.2}s", time);
            player.pause();
            player.tick(step);
            player.play();
        }
        time = player.tick(step);
        ticks += 1;
        peak_alive = peak_alive.max(danmaku.lock().alive_count());
    }

    let mut danmaku = danmaku.lock();
    let stats = danmaku.stats();
    let summary = ReplaySummary {
        comments,
        ticks,
        accepted: stats.accepted,
        rejected: stats.rejected,
        missed: stats.missed,
        discarded: stats.discarded,
        peak_alive,
        pool_capacity: danmaku.pool_capacity(),
        lane_count: danmaku.lane_count(),
        end_time: time,
    };
    danmaku.teardown();
    summary
}
