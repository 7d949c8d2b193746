//! Fire scheduler
//!
//! A cursor over the time-ascending comment queue. Each playback tick scans
//! forward from the cursor through a window centered on the current time:
//! entries before the window (or without a finite time) are missed for good,
//! entries after it wait for a later tick. In normal mode the first rejected
//! insertion halts the tick without consuming the entry; in unlimited mode it
//! is dropped and the scan goes on.

use super::bullet::BulletId;
use super::comment::CommentItem;
use super::lanes::Rejection;

/// Half width of the fire window in seconds
pub fn window_inc(unlimited: bool) -> f64 {
    if unlimited { 0.5 } else { 1.0 }
}

/// Where the scheduler hands in-window comments
pub trait CommentSink {
    /// Filtered comments are consumed without being shown
    fn should_discard(&self, item: &CommentItem) -> bool;

    /// Try to place `item` in a lane at playback time `now`
    fn insert(&mut self, item: &CommentItem, now: f64) -> Result<BulletId, Rejection>;
}

/// Outcome of a single fire tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    pub accepted: usize,
    pub rejected: usize,
    pub missed: usize,
    pub discarded: usize,
    /// Stopped at a rejected entry (normal mode backpressure)
    pub halted: bool,
}

/// Counters accumulated across ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub fires: u64,
    pub accepted: u64,
    /// Rejected insertion attempts; a halted entry is counted on every retry
    pub rejected: u64,
    /// Entries that fell behind the window before they could be attempted
    pub missed: u64,
    pub discarded: u64,
}

impl SchedulerStats {
    fn record(&mut self, report: &FireReport) {
        self.fires += 1;
        self.accepted += report.accepted as u64;
        self.rejected += report.rejected as u64;
        self.missed += report.missed as u64;
        self.discarded += report.discarded as u64;
    }
}

/// Comments out of time order are never reordered, only reported
fn warn_if_unordered(items: &[CommentItem]) {
    if let Some(pos) = items.windows(2).position(|w| w[1].time < w[0].time) {
        tracing::warn!(
            "Comment queue is not time-ascending at {:.2}s -> {:.2}s; later entries may be missed",
            items[pos].time,
            items[pos + 1].time
        );
    }
}

#[derive(Debug, Default)]
pub struct FireScheduler {
    queue: Vec<CommentItem>,
    cursor: usize,
    stats: SchedulerStats,
}

impl FireScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the queue; the cursor is kept
    pub fn append(&mut self, items: impl IntoIterator<Item = CommentItem>) {
        let start = self.queue.len().saturating_sub(1);
        self.queue.extend(items);
        warn_if_unordered(&self.queue[start..]);
    }

    /// Replace the queue and restart from its first entry
    pub fn reset(&mut self, items: Vec<CommentItem>) {
        warn_if_unordered(&items);
        self.queue = items;
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Entries not yet consumed by the cursor
    pub fn pending(&self) -> &[CommentItem] {
        &self.queue[self.cursor..]
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Scan the queue for playback time `now`
    pub fn fire(
        &mut self,
        now: f64,
        unlimited: bool,
        sink: &mut impl CommentSink,
    ) -> FireReport {
        let inc = window_inc(unlimited);
        let (min, max) = (now - inc, now + inc);
        let mut report = FireReport::default();

        while let Some(item) = self.queue.get(self.cursor) {
            if !item.time.is_finite() {
                tracing::trace!("Dropped comment with invalid time {:?}", item.time);
                report.missed += 1;
                self.cursor += 1;
                continue;
            }
            if item.time < min {
                tracing::trace!("Missed comment at {:.2}s (now {:.2}s)", item.time, now);
                report.missed += 1;
                self.cursor += 1;
                continue;
            }
            if item.time > max {
                break;
            }
            if sink.should_discard(item) {
                report.discarded += 1;
                self.cursor += 1;
                continue;
            }
            match sink.insert(item, now) {
                Ok(_) => report.accepted += 1,
                Err(rejection) => {
                    tracing::trace!(
                        "Rejected {} comment at {:.2}s: {:?}",
                        item.kind,
                        item.time,
                        rejection
                    );
                    report.rejected += 1;
                    if !unlimited {
                        report.halted = true;
                        break;
                    }
                }
            }
            self.cursor += 1;
        }

        self.stats.record(&report);
        report
    }
}
