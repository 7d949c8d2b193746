//! Danmaku controller
//!
//! Owns the options, the stage and the fire scheduler, and wires them to a
//! host player. The controller is shared with its event handlers as
//! `Arc<Mutex<Danmaku>>`; handlers only hold a `Weak`, so dropping the last
//! strong handle tears everything down and no handler can resurrect it.
//!
//! ## Event wiring
//! ```text
//! time-update --> sync_clock()      (always, while playing)
//!             `-> fire()            (only while enabled and playing)
//! pause/ended --> pause()           (only while enabled)
//! mounted     --> update_viewport() (always)
//! ```
//! Bullets keep moving and retiring while the scheduler is disabled; only the
//! queue scan stops.
//! Do not emit host events while holding the controller lock.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::bullet::{Bullet, BulletId};
use super::comment::{BlockKind, CommentItem, CommentType};
use super::lanes::Rejection;
use super::options::{Area, DanmakuOptions, DanmakuOverrides};
use super::scheduler::{CommentSink, FireReport, FireScheduler, SchedulerStats};
use super::stage::Stage;
use crate::player::{EventHandler, PlayerEventKind, PlayerHost, Subscription};

/// Controller handle shared with host event handlers
pub type SharedDanmaku = Arc<Mutex<Danmaku>>;

pub struct Danmaku {
    player: Arc<dyn PlayerHost>,
    /// Options supplied at construction, reapplied by `reset_options`
    overrides: DanmakuOverrides,
    stage: Stage,
    scheduler: FireScheduler,
    enabled: bool,
    /// time-update/pause/ended listeners, present while enabled
    playback_hooks: Option<Subscription>,
    /// mounted and clock listeners, live as long as the controller
    lifecycle_hooks: Option<Subscription>,
    this: Weak<Mutex<Danmaku>>,
}

impl std::fmt::Debug for Danmaku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Danmaku")
            .field("enabled", &self.enabled)
            .field("paused", &self.stage.is_paused())
            .field("lane_count", &self.stage.lane_count())
            .field("alive", &self.stage.pool().alive_count())
            .field("cursor", &self.scheduler.cursor())
            .finish_non_exhaustive()
    }
}

impl Danmaku {
    /// Create a controller attached to `player`
    ///
    /// Lanes are laid out from the player's current viewport and recomputed on
    /// every `mounted` event. Unless `overrides.disable` is set the scheduler is
    /// enabled right away.
    pub fn new(player: Arc<dyn PlayerHost>, overrides: DanmakuOverrides) -> SharedDanmaku {
        let opts = DanmakuOptions::with_overrides(&overrides);
        let enabled = !opts.disable;
        let viewport = player.rect();

        let shared = Arc::new_cyclic(|this| {
            Mutex::new(Danmaku {
                player,
                overrides,
                stage: Stage::new(opts, viewport),
                scheduler: FireScheduler::new(),
                enabled: false,
                playback_hooks: None,
                lifecycle_hooks: None,
                this: this.clone(),
            })
        });

        {
            let mut danmaku = shared.lock();
            danmaku.update_opacity(None);
            danmaku.update_fontsize(None);
            let mut hooks = Subscription::new(&danmaku.player);
            hooks.listen(
                PlayerEventKind::Mounted,
                danmaku.handler(|d| d.update_viewport()),
            );
            hooks.listen(
                PlayerEventKind::TimeUpdate,
                danmaku.handler(|d| {
                    d.sync_clock();
                }),
            );
            danmaku.lifecycle_hooks = Some(hooks);
            if enabled {
                danmaku.enable();
            }
        }
        shared
    }

    /// Wrap a controller method as a host event handler
    fn handler(&self, action: impl Fn(&mut Danmaku) + Send + Sync + 'static) -> EventHandler {
        let this = self.this.clone();
        Arc::new(move |_| {
            if let Some(danmaku) = this.upgrade() {
                let mut guard = danmaku.lock();
                action(&mut *guard);
            }
        })
    }

    // ---- Scheduling ----

    /// Move alive bullets to the player's clock and retire finished ones
    ///
    /// Runs whether or not the scheduler is enabled. Returns the playback
    /// time, or `None` when the player is not playing.
    pub fn sync_clock(&mut self) -> Option<f64> {
        if !self.player.is_playing() {
            return None;
        }
        let now = self.player.current_time();
        let retired = self.stage.advance(now);
        if retired > 0 {
            tracing::trace!("Retired {} bullets at {:.2}s", retired, now);
        }
        if self.stage.is_paused() {
            self.resume();
        }
        Some(now)
    }

    /// One fire tick at the player's current time
    ///
    /// Returns `None` when disabled or when the player is not playing.
    pub fn fire(&mut self) -> Option<FireReport> {
        if !self.enabled {
            return None;
        }
        let now = self.sync_clock()?;
        let unlimited = self.stage.opts.unlimited;
        let report = self.scheduler.fire(now, unlimited, &mut self.stage);
        if report.accepted + report.rejected + report.missed > 0 {
            tracing::debug!(
                "Fire at {:.2}s: +{} accepted, {} rejected, {} missed, {} alive",
                now,
                report.accepted,
                report.rejected,
                report.missed,
                self.stage.pool().alive_count()
            );
        }
        Some(report)
    }

    /// Show a locally authored comment immediately
    ///
    /// The comment is forced and timed at the current playback position; it
    /// never goes through the queue.
    pub fn send(&mut self, item: CommentItem) -> Result<BulletId, Rejection> {
        let now = self.player.current_time();
        let item = CommentItem {
            time: now,
            is_me: true,
            force: true,
            ..item
        };
        self.stage.advance(now);
        let result = self.stage.insert(&item, now);
        if let Err(rejection) = &result {
            tracing::debug!("Sent comment rejected: {:?}", rejection);
        }
        result
    }

    pub fn append_items(&mut self, items: impl IntoIterator<Item = CommentItem>) {
        self.scheduler.append(items);
    }

    /// Replace the queue; alive bullets keep running
    pub fn reset_items(&mut self, items: Vec<CommentItem>) {
        self.scheduler.reset(items);
    }

    /// Host reports a bullet finished its animation
    pub fn finish_bullet(&mut self, id: BulletId) -> bool {
        self.stage.retire(id)
    }

    // ---- Motion ----

    pub fn pause(&mut self) {
        self.stage.pause_all();
    }

    pub fn resume(&mut self) {
        self.stage.run_all();
    }

    // ---- Filtering ----

    pub fn block_type(&mut self, kind: BlockKind) {
        if !self.stage.opts.blocked.insert(kind) {
            return;
        }
        tracing::debug!("Blocked {} comments", kind);
        self.stage.refresh_visibility();
    }

    pub fn allow_type(&mut self, kind: BlockKind) {
        if !self.stage.opts.blocked.remove(&kind) {
            return;
        }
        tracing::debug!("Allowed {} comments", kind);
        self.stage.refresh_visibility();
    }

    // ---- Options ----

    /// Set the overlay opacity, or reapply the current one
    pub fn update_opacity(&mut self, opacity: Option<f64>) {
        let opacity = opacity.unwrap_or(self.stage.opts.opacity);
        self.stage.opts.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Set the font scale, or reapply the current one, and re-layout lanes
    pub fn update_fontsize(&mut self, scale: Option<f64>) {
        if let Some(scale) = scale {
            self.stage.opts.fontsize_scale = scale;
        }
        self.stage.update_layout();
        self.stage.update_motion();
    }

    /// Set the vertical coverage; values other than 0.25/0.5/0.75/1 are ignored
    pub fn update_area(&mut self, area: f64) {
        let Some(area) = Area::from_fraction(area) else {
            tracing::trace!("Ignoring unsupported danmaku area {}", area);
            return;
        };
        self.stage.opts.area = area;
        self.stage.update_layout();
    }

    pub fn update_unlimited(&mut self, unlimited: bool) {
        self.stage.opts.unlimited = unlimited;
    }

    pub fn update_bottom_up(&mut self, bottom_up: bool) {
        self.stage.opts.bottom_up = bottom_up;
    }

    /// Set the scroll speed; alive bullets recompute their motion
    pub fn update_speed(&mut self, speed: f64) {
        self.stage.opts.speed = speed;
        self.stage.update_motion();
    }

    /// Back to defaults plus construction overrides, with nothing blocked
    pub fn reset_options(&mut self) {
        self.stage.opts = DanmakuOptions::with_overrides(&self.overrides);
        self.stage.opts.blocked.clear();
        self.update_opacity(None);
        self.update_fontsize(None);
        self.stage.refresh_visibility();
    }

    /// Re-read the viewport from the player and re-layout lanes
    pub fn update_viewport(&mut self) {
        self.stage.set_viewport(self.player.rect());
    }

    // ---- Attachment ----

    /// Subscribe the scheduler and pause hooks to the player
    pub fn enable(&mut self) {
        self.enabled = true;
        if self.playback_hooks.as_ref().is_some_and(Subscription::is_active) {
            return;
        }
        let mut hooks = Subscription::new(&self.player);
        hooks.listen(PlayerEventKind::TimeUpdate, self.handler(|d| {
            d.fire();
        }));
        hooks.listen(PlayerEventKind::Pause, self.handler(Danmaku::pause));
        hooks.listen(PlayerEventKind::Ended, self.handler(Danmaku::pause));
        self.playback_hooks = Some(hooks);
        tracing::info!("Danmaku enabled");
    }

    /// Unsubscribe from the player; safe to call repeatedly
    pub fn disable(&mut self) {
        self.enabled = false;
        if let Some(mut hooks) = self.playback_hooks.take() {
            hooks.cancel();
            tracing::info!("Danmaku disabled");
        }
    }

    /// Detach from the player and return every alive bullet to the pool
    pub fn teardown(&mut self) {
        self.disable();
        if let Some(mut hooks) = self.lifecycle_hooks.take() {
            hooks.cancel();
        }
        let retired = self.stage.retire_all();
        tracing::debug!("Danmaku torn down, {} bullets pooled", retired);
    }

    // ---- Accessors ----

    pub fn options(&self) -> &DanmakuOptions {
        &self.stage.opts
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_paused(&self) -> bool {
        self.stage.is_paused()
    }

    pub fn lane_count(&self) -> usize {
        self.stage.lane_count()
    }

    pub fn lane_height(&self) -> f64 {
        self.stage.lane_height()
    }

    /// Rendered font size in pixels
    pub fn font_px(&self) -> f64 {
        self.stage.opts.font_px()
    }

    /// Pixel offset from the top of the viewport of a lane
    pub fn lane_offset(&self, kind: CommentType, lane: usize) -> f64 {
        self.stage.lane_offset(kind, lane)
    }

    pub fn lane_occupant(&self, kind: CommentType, lane: usize) -> Option<&Bullet> {
        self.stage
            .lanes()
            .family(kind)
            .occupant(lane)
            .and_then(|id| self.stage.pool().get(id))
    }

    pub fn bullet(&self, id: BulletId) -> Option<&Bullet> {
        self.stage.pool().get(id)
    }

    /// Alive bullets
    pub fn bullets(&self) -> impl Iterator<Item = &Bullet> + '_ {
        self.stage.pool().alive()
    }

    pub fn alive_count(&self) -> usize {
        self.stage.pool().alive_count()
    }

    /// Retired bullets waiting for reuse
    pub fn pooled_count(&self) -> usize {
        self.stage.pool().free_count()
    }

    pub fn pool_capacity(&self) -> usize {
        self.stage.pool().capacity()
    }

    pub fn cursor(&self) -> usize {
        self.scheduler.cursor()
    }

    pub fn queue_len(&self) -> usize {
        self.scheduler.queue_len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Pool and alive set disjoint, and every alive bullet alone in its lane
    pub fn is_consistent(&self) -> bool {
        let pool = self.stage.pool();
        if !pool.is_consistent() {
            return false;
        }
        pool.alive().all(|bullet| {
            self.stage.lanes().family(bullet.kind()).occupant(bullet.lane()) == Some(bullet.id())
        })
    }

    /// Whether `item` would be filtered out by the current block list
    pub fn would_discard(&self, item: &CommentItem) -> bool {
        self.stage.should_discard(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{SimulatedPlayer, ViewportRect};

    /// Player with the given viewport, playing from time 0
    fn setup(width: f64, height: f64, overrides: DanmakuOverrides) -> (Arc<SimulatedPlayer>, SharedDanmaku) {
        let player = Arc::new(SimulatedPlayer::new(ViewportRect::new(width, height)));
        let host: Arc<dyn PlayerHost> = player.clone();
        let danmaku = Danmaku::new(host, overrides);
        player.play();
        (player, danmaku)
    }

    fn lane_text(danmaku: &SharedDanmaku, kind: CommentType, lane: usize) -> Option<String> {
        danmaku
            .lock()
            .lane_occupant(kind, lane)
            .map(|b| b.text().to_string())
    }

    #[test]
    fn test_single_lane_backpressure_scenario() {
        // 60px * 0.5 / 26px = 1 lane
        let (player, danmaku) = setup(800.0, 60.0, DanmakuOverrides::default());
        assert_eq!(danmaku.lock().lane_count(), 1);
        danmaku.lock().reset_items(vec![
            CommentItem::new(10.0, "a"),
            CommentItem::new(10.3, "b"),
            CommentItem::new(20.0, "c"),
        ]);

        player.set_time(9.5);
        assert_eq!(lane_text(&danmaku, CommentType::Scroll, 0).as_deref(), Some("a"));
        assert_eq!(danmaku.lock().cursor(), 1);

        player.set_time(10.5);
        {
            let d = danmaku.lock();
            assert_eq!(d.lane_occupant(CommentType::Scroll, 0).map(|b| b.text()), Some("a"));
            assert_eq!(d.lane_occupant(CommentType::Scroll, 0).map(|b| b.show_time()), Some(10.0));
            // "b" was attempted and rejected, the cursor waits on it
            assert_eq!(d.cursor(), 1);
            assert!(d.stats().rejected >= 2);
        }

        player.set_time(11.0);
        assert_eq!(danmaku.lock().cursor(), 1);

        player.set_time(20.5);
        let d = danmaku.lock();
        assert_eq!(d.lane_occupant(CommentType::Scroll, 0).map(|b| b.text()), Some("c"));
        assert_eq!(d.cursor(), 3);
        assert_eq!(d.stats().missed, 1);
        assert_eq!(d.stats().accepted, 2);
        assert_eq!(d.alive_count(), 1);
        // "a" retired before "c" arrived and its slot was reused
        assert_eq!(d.pool_capacity(), 1);
        assert!(d.is_consistent());
        assert!(d.bullets().all(|b| b.text() != "b"));
    }

    #[test]
    fn test_send_displaces_soonest_clearing_lane() {
        // 110px * 0.5 / 26px = 2 lanes
        let (player, danmaku) = setup(800.0, 110.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![
            CommentItem::new(3.0, "x"),
            CommentItem::new(4.0, "y"),
        ]);
        player.set_time(3.5);
        player.set_time(5.0);
        assert_eq!(danmaku.lock().alive_count(), 2);

        let id = danmaku
            .lock()
            .send(CommentItem::new(0.0, "hi"))
            .unwrap();
        let d = danmaku.lock();
        let bullet = d.bullet(id).unwrap();
        assert_eq!(bullet.lane(), 0);
        assert!(bullet.is_me());
        assert_eq!(bullet.show_time(), 5.0);
        assert_eq!(bullet.prior_show_time(), Some(3.0));
        assert_eq!(lane_text_locked(&d, 1).as_deref(), Some("y"));
        assert_eq!(d.alive_count(), 2);
        assert!(d.is_consistent());
    }

    fn lane_text_locked(d: &Danmaku, lane: usize) -> Option<String> {
        d.lane_occupant(CommentType::Scroll, lane)
            .map(|b| b.text().to_string())
    }

    #[test]
    fn test_send_bypasses_queue() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        player.set_time(42.0);
        danmaku
            .lock()
            .send(CommentItem::new(0.0, "now").with_kind(CommentType::Top))
            .unwrap();
        let d = danmaku.lock();
        assert_eq!(d.cursor(), 0);
        assert_eq!(d.queue_len(), 0);
        assert_eq!(
            d.lane_occupant(CommentType::Top, 0).map(|b| b.text()),
            Some("now")
        );
    }

    #[test]
    fn test_update_area_ignores_invalid_values() {
        let (_player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        let mut d = danmaku.lock();
        assert_eq!(d.lane_count(), 10);

        d.update_area(0.9);
        assert_eq!(d.options().area, Area::Half);
        assert_eq!(d.lane_count(), 10);

        d.update_area(1.0);
        assert_eq!(d.options().area, Area::Full);
        assert_eq!(d.lane_count(), 20);
    }

    #[test]
    fn test_update_fontsize_relayouts_lanes() {
        let (_player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        let mut d = danmaku.lock();
        // lane height 24 * 0.5 + 2 = 14, 260 / 14 = 18
        d.update_fontsize(Some(0.5));
        assert_eq!(d.lane_height(), 14.0);
        assert_eq!(d.lane_count(), 18);
        d.update_fontsize(None);
        assert_eq!(d.lane_count(), 18);
    }

    #[test]
    fn test_block_color_hides_only_custom_colors() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![
            CommentItem::new(1.0, "palette").with_color("#FE0302"),
            CommentItem::new(1.0, "custom").with_color("#123456"),
            CommentItem::new(1.0, "plain"),
        ]);
        player.set_time(1.0);

        let visible = |d: &Danmaku, text: &str| {
            d.bullets()
                .find(|b| b.text() == text)
                .map(|b| !b.is_hidden())
        };

        let mut d = danmaku.lock();
        d.block_type(BlockKind::Color);
        assert_eq!(visible(&d, "palette"), Some(true));
        assert_eq!(visible(&d, "custom"), Some(false));
        assert_eq!(visible(&d, "plain"), Some(true));

        d.allow_type(BlockKind::Color);
        assert_eq!(visible(&d, "custom"), Some(true));
    }

    #[test]
    fn test_block_type_is_retroactive() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![
            CommentItem::new(1.0, "s"),
            CommentItem::new(1.0, "t").with_kind(CommentType::Top),
            CommentItem::new(1.5, "s2"),
        ]);
        player.set_time(1.0);

        let mut d = danmaku.lock();
        d.block_type(BlockKind::Scroll);
        assert!(
            d.bullets()
                .filter(|b| b.kind() == CommentType::Scroll)
                .all(Bullet::is_hidden)
        );
        assert!(
            d.bullets()
                .filter(|b| b.kind() == CommentType::Top)
                .all(|b| !b.is_hidden())
        );

        d.allow_type(BlockKind::Scroll);
        assert!(d.bullets().all(|b| !b.is_hidden()));
    }

    #[test]
    fn test_blocked_comments_are_consumed_but_not_shown() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        {
            let mut d = danmaku.lock();
            d.block_type(BlockKind::Top);
            d.reset_items(vec![
                CommentItem::new(2.0, "top").with_kind(CommentType::Top),
                CommentItem::new(2.0, "scroll"),
            ]);
        }
        player.set_time(2.0);
        let d = danmaku.lock();
        assert_eq!(d.cursor(), 2);
        assert_eq!(d.stats().discarded, 1);
        assert_eq!(d.alive_count(), 1);
    }

    #[test]
    fn test_pause_event_pauses_and_next_fire_resumes() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![CommentItem::new(1.0, "a")]);
        player.set_time(1.0);

        player.pause();
        {
            let d = danmaku.lock();
            assert!(d.is_paused());
            assert!(d.bullets().all(Bullet::is_paused));
        }

        // Not playing: time-update is a no-op and motion stays paused
        player.set_time(1.2);
        assert!(danmaku.lock().is_paused());

        player.play();
        player.set_time(1.4);
        let d = danmaku.lock();
        assert!(!d.is_paused());
        assert!(d.bullets().all(|b| !b.is_paused()));
    }

    #[test]
    fn test_ended_event_pauses() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![CommentItem::new(0.5, "a")]);
        player.set_time(0.5);
        player.end();
        assert!(danmaku.lock().is_paused());
    }

    #[test]
    fn test_disable_unsubscribes_and_is_idempotent() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        // Clock hook plus scheduler hook
        assert_eq!(player.listener_count(PlayerEventKind::TimeUpdate), 2);
        danmaku.lock().reset_items(vec![CommentItem::new(1.0, "a")]);

        danmaku.lock().disable();
        danmaku.lock().disable();
        assert_eq!(player.listener_count(PlayerEventKind::TimeUpdate), 1);
        assert_eq!(player.listener_count(PlayerEventKind::Pause), 0);
        assert_eq!(player.listener_count(PlayerEventKind::Ended), 0);

        player.set_time(1.0);
        assert_eq!(danmaku.lock().alive_count(), 0);
        assert_eq!(danmaku.lock().stats().fires, 0);

        danmaku.lock().enable();
        danmaku.lock().enable();
        assert_eq!(player.listener_count(PlayerEventKind::TimeUpdate), 2);
        player.set_time(1.0);
        assert_eq!(danmaku.lock().alive_count(), 1);
    }

    #[test]
    fn test_bullets_retire_while_disabled() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku
            .lock()
            .reset_items(vec![CommentItem::new(1.0, "a"), CommentItem::new(50.0, "b")]);
        player.set_time(1.0);
        assert_eq!(danmaku.lock().alive_count(), 1);

        danmaku.lock().disable();
        player.set_time(100.0);
        let d = danmaku.lock();
        assert_eq!(d.alive_count(), 0);
        assert_eq!(d.pooled_count(), 1);
        assert!(d.lane_occupant(CommentType::Scroll, 0).is_none());
        // The queue is not scanned while disabled
        assert_eq!(d.cursor(), 1);
    }

    #[test]
    fn test_invalid_time_never_occupies_a_lane() {
        // One scroll lane
        let (player, danmaku) = setup(800.0, 60.0, DanmakuOverrides::default());
        danmaku
            .lock()
            .reset_items(vec![CommentItem::new(f64::NAN, "nan"), CommentItem::new(5.0, "b")]);
        player.set_time(5.0);
        let d = danmaku.lock();
        assert_eq!(d.stats().accepted, 1);
        assert_eq!(d.stats().missed, 1);
        assert_eq!(d.stats().rejected, 0);
        let occupant = d.lane_occupant(CommentType::Scroll, 0).unwrap();
        assert_eq!(occupant.text(), "b");
        assert_eq!(occupant.prior_show_time(), None);
    }

    #[test]
    fn test_would_discard_follows_block_list() {
        let (_player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        let mut d = danmaku.lock();
        let custom = CommentItem::new(0.0, "c").with_color("#123456");
        let top = CommentItem::new(0.0, "t").with_kind(CommentType::Top);
        assert!(!d.would_discard(&custom));
        assert!(!d.would_discard(&top));

        d.block_type(BlockKind::Color);
        d.block_type(BlockKind::Top);
        assert!(d.would_discard(&custom));
        assert!(d.would_discard(&top));
        assert!(!d.would_discard(&CommentItem::new(0.0, "plain")));
    }

    #[test]
    fn test_disabled_by_option() {
        let overrides = DanmakuOverrides {
            disable: Some(true),
            ..Default::default()
        };
        let (player, danmaku) = setup(800.0, 520.0, overrides);
        assert!(!danmaku.lock().is_enabled());
        assert_eq!(player.listener_count(PlayerEventKind::TimeUpdate), 1);
        assert_eq!(player.listener_count(PlayerEventKind::Pause), 0);
        assert_eq!(player.listener_count(PlayerEventKind::Mounted), 1);
    }

    #[test]
    fn test_dropping_controller_releases_listeners() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        drop(danmaku);
        assert_eq!(player.listener_count(PlayerEventKind::TimeUpdate), 0);
        assert_eq!(player.listener_count(PlayerEventKind::Mounted), 0);
        // Nothing left to call into
        player.set_time(3.0);
    }

    #[test]
    fn test_mounted_recomputes_lanes() {
        let (player, danmaku) = setup(800.0, 0.0, DanmakuOverrides::default());
        assert_eq!(danmaku.lock().lane_count(), 0);
        player.resize(ViewportRect::new(800.0, 520.0));
        player.mount();
        assert_eq!(danmaku.lock().lane_count(), 10);
    }

    #[test]
    fn test_update_speed_reaches_alive_bullets() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![CommentItem::new(1.0, "a")]);
        player.set_time(1.0);
        let mut d = danmaku.lock();
        d.update_speed(2.0);
        assert!(d.bullets().all(|b| b.lifetime() == 4.0));
    }

    #[test]
    fn test_reset_options_restores_overrides_and_clears_blocks() {
        let overrides = DanmakuOverrides {
            speed: Some(1.5),
            blocked: Some([BlockKind::Bottom].into_iter().collect()),
            ..Default::default()
        };
        let (_player, danmaku) = setup(800.0, 520.0, overrides);
        let mut d = danmaku.lock();
        assert!(d.options().blocked.contains(&BlockKind::Bottom));

        d.update_speed(3.0);
        d.update_area(0.25);
        d.update_opacity(Some(0.3));
        d.block_type(BlockKind::Top);
        d.reset_options();

        assert_eq!(d.options().speed, 1.5);
        assert_eq!(d.options().area, Area::Half);
        assert_eq!(d.options().opacity, 1.0);
        assert!(d.options().blocked.is_empty());
        assert_eq!(d.lane_count(), 10);
    }

    #[test]
    fn test_reset_items_keeps_alive_bullets() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![CommentItem::new(1.0, "a")]);
        player.set_time(1.0);
        danmaku
            .lock()
            .reset_items(vec![CommentItem::new(0.5, "x"), CommentItem::new(1.2, "y")]);
        {
            let d = danmaku.lock();
            assert_eq!(d.cursor(), 0);
            assert_eq!(d.alive_count(), 1);
        }
        player.set_time(1.2);
        let d = danmaku.lock();
        assert_eq!(d.alive_count(), 3);
        assert!(d.is_consistent());
    }

    #[test]
    fn test_unlimited_mode_drops_individually() {
        let overrides = DanmakuOverrides {
            unlimited: Some(true),
            ..Default::default()
        };
        // One lane for each family
        let (player, danmaku) = setup(800.0, 60.0, overrides);
        danmaku.lock().reset_items(vec![
            CommentItem::new(5.0, "a"),
            CommentItem::new(5.1, "b"),
            CommentItem::new(5.2, "t").with_kind(CommentType::Top),
        ]);
        player.set_time(5.0);
        let d = danmaku.lock();
        assert_eq!(d.cursor(), 3);
        assert_eq!(d.stats().rejected, 1);
        assert_eq!(d.alive_count(), 2);
    }

    #[test]
    fn test_finish_bullet_returns_to_pool() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![CommentItem::new(1.0, "a")]);
        player.set_time(1.0);
        let mut d = danmaku.lock();
        let id = d.bullets().next().map(Bullet::id).unwrap();
        assert!(d.finish_bullet(id));
        assert!(!d.finish_bullet(id));
        assert_eq!(d.alive_count(), 0);
        assert_eq!(d.pooled_count(), 1);
        assert!(d.lane_occupant(CommentType::Scroll, 0).is_none());
    }

    #[test]
    fn test_teardown_pools_everything() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![
            CommentItem::new(1.0, "a"),
            CommentItem::new(1.0, "b").with_kind(CommentType::Bottom),
        ]);
        player.set_time(1.0);
        danmaku.lock().teardown();
        danmaku.lock().teardown();
        let d = danmaku.lock();
        assert_eq!(d.alive_count(), 0);
        assert_eq!(d.pooled_count(), 2);
        assert!(!d.is_enabled());
        assert_eq!(player.listener_count(PlayerEventKind::Mounted), 0);
        assert_eq!(player.listener_count(PlayerEventKind::TimeUpdate), 0);
    }

    #[test]
    fn test_lanes_never_shared_under_load() {
        let (player, danmaku) = setup(800.0, 160.0, DanmakuOverrides::default());
        let items: Vec<CommentItem> = (0..400)
            .map(|i| {
                let kind = match i % 5 {
                    0 => CommentType::Top,
                    1 => CommentType::Bottom,
                    _ => CommentType::Scroll,
                };
                let item = CommentItem::new(i as f64 * 0.1, format!("c{}", i)).with_kind(kind);
                if i % 7 == 0 { item.forced() } else { item }
            })
            .collect();
        danmaku.lock().reset_items(items);

        let mut last_cursor = 0;
        for step in 0..500 {
            player.set_time(step as f64 * 0.1);
            let d = danmaku.lock();
            assert!(d.is_consistent());
            assert!(d.cursor() >= last_cursor);
            last_cursor = d.cursor();
            for kind in CommentType::all() {
                let mut lanes: Vec<usize> = d
                    .bullets()
                    .filter(|b| b.kind() == kind)
                    .map(Bullet::lane)
                    .collect();
                let total = lanes.len();
                lanes.sort_unstable();
                lanes.dedup();
                assert_eq!(lanes.len(), total);
            }
        }
    }

    #[test]
    fn test_missed_comments_never_shown() {
        let (player, danmaku) = setup(800.0, 520.0, DanmakuOverrides::default());
        danmaku.lock().reset_items(vec![
            CommentItem::new(1.0, "early"),
            CommentItem::new(30.0, "on-time"),
        ]);
        // Seek past the first comment before any tick
        player.set_time(30.0);
        let d = danmaku.lock();
        assert_eq!(d.stats().missed, 1);
        assert!(d.bullets().all(|b| b.text() != "early"));
        assert_eq!(d.alive_count(), 1);
    }
}
