//! Bullet - a pooled, displayable comment instance
//!
//! A bullet owns the motion bookkeeping of one comment: which lane it sits in,
//! when it was shown, and how far it has travelled. Progress is driven by the
//! playback clock, so a paused player freezes every bullet for free.

use super::comment::{CommentItem, CommentType};

/// Time a scroll bullet needs to cross the viewport at speed 1.0 (seconds)
pub const SCROLL_DURATION: f64 = 8.0;

/// Slot index of a bullet inside the pool arena
///
/// Ids are recycled together with their slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BulletId(pub(crate) usize);

impl BulletId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lane placement produced by an accepted allocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletSetting {
    pub lane: usize,
    /// `show_time` of the bullet this one replaced in the lane
    pub prior_show_time: Option<f64>,
    /// Playback time at insertion
    pub now: f64,
}

/// Controller state a bullet needs to compute its own motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionContext {
    pub viewport_width: f64,
    pub font_px: f64,
    pub speed: f64,
    /// Display time of pinned bullets
    pub duration: f64,
}

/// Estimated rendered width of `text` in pixels
///
/// ASCII glyphs count as two thirds of a full width, everything else (CJK,
/// emoji) as a full width.
pub fn estimate_text_width(text: &str, font_px: f64) -> f64 {
    let thirds: u32 = text
        .chars()
        .map(|ch| if ch.is_ascii() { 2 } else { 3 })
        .sum();
    font_px * thirds as f64 / 3.0
}

#[derive(Debug, Clone)]
pub struct Bullet {
    id: BulletId,
    kind: CommentType,
    lane: usize,
    show_time: f64,
    prior_show_time: Option<f64>,
    text: String,
    color: Option<String>,
    /// Color outside the palette (subject to color blocking)
    custom_color: bool,
    is_me: bool,
    text_width: f64,
    /// Fraction of the display lifetime already elapsed, 0.0..=1.0
    progress: f64,
    lifetime: f64,
    /// Horizontal speed in px/s, 0 for pinned bullets
    travel_speed: f64,
    last_clock: f64,
    paused: bool,
    hidden: bool,
}

impl Bullet {
    pub(crate) fn new(
        id: BulletId,
        item: &CommentItem,
        setting: BulletSetting,
        motion: &MotionContext,
        custom_color: bool,
    ) -> Self {
        let mut bullet = Self {
            id,
            kind: item.kind,
            lane: 0,
            show_time: 0.0,
            prior_show_time: None,
            text: String::new(),
            color: None,
            custom_color: false,
            is_me: false,
            text_width: 0.0,
            progress: 0.0,
            lifetime: 0.0,
            travel_speed: 0.0,
            last_clock: 0.0,
            paused: false,
            hidden: false,
        };
        bullet.init(item, setting, motion, custom_color);
        bullet
    }

    /// Reinitialize a pooled bullet for a new comment, reusing its buffers
    pub(crate) fn init(
        &mut self,
        item: &CommentItem,
        setting: BulletSetting,
        motion: &MotionContext,
        custom_color: bool,
    ) {
        self.kind = item.kind;
        self.lane = setting.lane;
        self.show_time = item.time;
        self.prior_show_time = setting.prior_show_time;
        self.text.clone_from(&item.text);
        self.color.clone_from(&item.color);
        self.custom_color = custom_color;
        self.is_me = item.is_me;
        self.progress = 0.0;
        self.last_clock = setting.now;
        self.paused = false;
        self.hidden = false;
        self.update_speed(motion);
    }

    /// Recompute lifetime and travel speed, keeping the elapsed fraction
    pub(crate) fn update_speed(&mut self, motion: &MotionContext) {
        self.text_width = estimate_text_width(&self.text, motion.font_px);
        match self.kind {
            CommentType::Scroll => {
                self.lifetime = if motion.speed > 0.0 {
                    SCROLL_DURATION / motion.speed
                } else {
                    f64::INFINITY
                };
                self.travel_speed = (motion.viewport_width + self.text_width) / self.lifetime;
            }
            CommentType::Top | CommentType::Bottom => {
                self.lifetime = motion.duration;
                self.travel_speed = 0.0;
            }
        }
    }

    /// Move the bullet forward to playback time `now`
    ///
    /// Returns `true` once the display lifetime has elapsed.
    pub(crate) fn advance(&mut self, now: f64) -> bool {
        let delta = (now - self.last_clock).max(0.0);
        self.last_clock = now;
        if !self.paused && delta > 0.0 {
            self.progress = if self.lifetime > 0.0 {
                (self.progress + delta / self.lifetime).min(1.0)
            } else {
                1.0
            };
        }
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= 1.0 || self.lifetime <= 0.0
    }

    pub(crate) fn pause(&mut self) {
        self.paused = true;
    }

    pub(crate) fn run(&mut self) {
        self.paused = false;
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn id(&self) -> BulletId {
        self.id
    }

    pub fn kind(&self) -> CommentType {
        self.kind
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn show_time(&self) -> f64 {
        self.show_time
    }

    pub fn prior_show_time(&self) -> Option<f64> {
        self.prior_show_time
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn has_custom_color(&self) -> bool {
        self.custom_color
    }

    pub fn is_me(&self) -> bool {
        self.is_me
    }

    pub fn text_width(&self) -> f64 {
        self.text_width
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn lifetime(&self) -> f64 {
        self.lifetime
    }

    pub fn travel_speed(&self) -> f64 {
        self.travel_speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}
