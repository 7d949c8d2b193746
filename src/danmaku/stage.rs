//! Stage - lanes, pool and layout
//!
//! The stage is the allocation side of the engine: it turns an accepted lane
//! decision into a live bullet, retires bullets whose lifetime elapsed, and
//! keeps lane occupancy in step with the pool. Every alive bullet sits in the
//! slot of its own lane; a displaced occupant is retired on the spot.

use super::bullet::{Bullet, BulletId, BulletSetting, MotionContext};
use super::comment::{BlockKind, CommentItem, CommentType, is_default_color};
use super::lanes::{Allocation, LaneTable, Rejection, allocate_fixed, allocate_scroll};
use super::options::DanmakuOptions;
use super::pool::BulletPool;
use super::scheduler::CommentSink;
use crate::player::ViewportRect;

/// Vertical padding added to the font size to get a lane height
pub const LANE_PADDING: f64 = 2.0;

/// Lane count for a viewport height, coverage fraction and lane height
pub fn lane_count_for(viewport_height: f64, area: f64, lane_height: f64) -> usize {
    if lane_height <= 0.0 || viewport_height <= 0.0 {
        return 0;
    }
    (viewport_height * area / lane_height).floor() as usize
}

#[derive(Debug)]
pub struct Stage {
    pub(crate) opts: DanmakuOptions,
    viewport: ViewportRect,
    lane_height: f64,
    lane_count: usize,
    lanes: LaneTable,
    pool: BulletPool,
    paused: bool,
    /// Scratch list reused by `advance`
    finished: Vec<BulletId>,
}

impl Stage {
    pub fn new(opts: DanmakuOptions, viewport: ViewportRect) -> Self {
        let mut stage = Self {
            opts,
            viewport,
            lane_height: 0.0,
            lane_count: 0,
            lanes: LaneTable::default(),
            pool: BulletPool::new(),
            paused: false,
            finished: Vec::new(),
        };
        stage.update_layout();
        stage
    }

    /// Recompute lane height and count from font metrics and area
    pub fn update_layout(&mut self) {
        self.lane_height = self.opts.font_px() + LANE_PADDING;
        let lane_count = lane_count_for(
            self.viewport.height,
            self.opts.area.fraction(),
            self.lane_height,
        );
        if lane_count != self.lane_count {
            tracing::debug!(
                "Danmaku lanes: {} -> {} (height {:.0}px, lane {:.1}px, area {})",
                self.lane_count,
                lane_count,
                self.viewport.height,
                self.lane_height,
                self.opts.area.fraction()
            );
        }
        self.lane_count = lane_count;
    }

    pub fn set_viewport(&mut self, viewport: ViewportRect) {
        self.viewport = viewport;
        self.update_layout();
        self.update_motion();
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn lane_height(&self) -> f64 {
        self.lane_height
    }

    pub fn lanes(&self) -> &LaneTable {
        &self.lanes
    }

    pub fn pool(&self) -> &BulletPool {
        &self.pool
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn motion(&self) -> MotionContext {
        MotionContext {
            viewport_width: self.viewport.width,
            font_px: self.opts.font_px(),
            speed: self.opts.speed,
            duration: self.opts.duration,
        }
    }

    fn is_custom_color(&self, color: Option<&str>) -> bool {
        color.is_some_and(|c| !is_default_color(c, &self.opts.colors))
    }

    /// Whether a bullet falls under the current block list
    fn is_blocked(&self, bullet: &Bullet) -> bool {
        self.opts.blocked.contains(&bullet.kind().block_kind())
            || (bullet.has_custom_color() && self.opts.blocked.contains(&BlockKind::Color))
    }

    /// Hide or reveal every alive bullet according to the block list
    pub fn refresh_visibility(&mut self) {
        let blocked = &self.opts.blocked;
        let block_color = blocked.contains(&BlockKind::Color);
        self.pool.for_each_alive(|bullet| {
            let hidden = blocked.contains(&bullet.kind().block_kind())
                || (block_color && bullet.has_custom_color());
            bullet.set_hidden(hidden);
        });
    }

    /// Let every alive bullet recompute its motion from the current options
    pub fn update_motion(&mut self) {
        let motion = self.motion();
        self.pool
            .for_each_alive(|bullet| bullet.update_speed(&motion));
    }

    pub fn pause_all(&mut self) {
        self.pool.for_each_alive(Bullet::pause);
        self.paused = true;
    }

    pub fn run_all(&mut self) {
        self.pool.for_each_alive(Bullet::run);
        self.paused = false;
    }

    /// Move bullets to playback time `now` and retire the finished ones
    pub fn advance(&mut self, now: f64) -> usize {
        let mut finished = std::mem::take(&mut self.finished);
        self.pool.for_each_alive(|bullet| {
            if bullet.advance(now) {
                finished.push(bullet.id());
            }
        });
        let count = finished.len();
        for id in finished.drain(..) {
            self.retire(id);
        }
        self.finished = finished;
        count
    }

    /// Free the lane of an alive bullet and return it to the pool
    pub fn retire(&mut self, id: BulletId) -> bool {
        let Some(bullet) = self.pool.get(id) else {
            return false;
        };
        let (kind, lane) = (bullet.kind(), bullet.lane());
        self.lanes.family_mut(kind).vacate(lane, id);
        tracing::trace!("Retired {} bullet {:?} from lane {}", kind, id, lane);
        self.pool.release(id)
    }

    /// Retire every alive bullet
    pub fn retire_all(&mut self) -> usize {
        self.lanes.clear();
        self.pool.release_all()
    }

    /// Pixel offset from the top of the viewport of a lane
    pub fn lane_offset(&self, kind: CommentType, lane: usize) -> f64 {
        let from_top = lane as f64 * self.lane_height;
        let from_bottom = self.viewport.height - (lane as f64 + 1.0) * self.lane_height;
        match kind {
            CommentType::Scroll if self.opts.bottom_up => from_bottom,
            CommentType::Scroll | CommentType::Top => from_top,
            CommentType::Bottom => from_bottom,
        }
    }
}

impl CommentSink for Stage {
    fn should_discard(&self, item: &CommentItem) -> bool {
        if self.opts.blocked.contains(&item.kind.block_kind()) {
            return true;
        }
        self.opts.blocked.contains(&BlockKind::Color) && self.is_custom_color(item.color.as_deref())
    }

    fn insert(&mut self, item: &CommentItem, now: f64) -> Result<BulletId, Rejection> {
        let allocation = {
            let pool = &self.pool;
            let show_time_of = |id| pool.get(id).map(Bullet::show_time);
            let lanes = self.lanes.family(item.kind);
            match item.kind {
                CommentType::Scroll => {
                    allocate_scroll(lanes, self.lane_count, item.force, now, show_time_of)
                }
                CommentType::Top | CommentType::Bottom => {
                    allocate_fixed(lanes, self.lane_count, item.force, show_time_of)
                }
            }
        };
        let assignment = match allocation {
            Allocation::Assigned(assignment) => assignment,
            Allocation::Rejected(rejection) => return Err(rejection),
        };

        if let Some(displaced) = assignment.displaced {
            self.retire(displaced);
        }

        let setting = BulletSetting {
            lane: assignment.lane,
            prior_show_time: assignment.prior_show_time,
            now,
        };
        let custom_color = self.is_custom_color(item.color.as_deref());
        let motion = self.motion();
        let id = self.pool.acquire(item, setting, &motion, custom_color);
        self.lanes.family_mut(item.kind).occupy(assignment.lane, id);

        let paused = self.paused;
        let hidden = self.pool.get(id).is_some_and(|bullet| self.is_blocked(bullet));
        if let Some(bullet) = self.pool.get_mut(id) {
            if paused {
                bullet.pause();
            }
            bullet.set_hidden(hidden);
        }

        tracing::trace!(
            "Placed {} comment {:?} in lane {} at {:.2}s",
            item.kind,
            item.text,
            assignment.lane,
            now
        );
        Ok(id)
    }
}
