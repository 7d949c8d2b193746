//! Lane allocation
//!
//! Three independent lane families share one `Allocation` result:
//! - scroll lanes take the first empty lane, or else the soonest-clearing one
//!   subject to a minimum spacing
//! - top and bottom lanes take the lowest empty lane, no spacing rule
//!
//! A forced comment never gets `TooClose`/`Saturated`; it displaces the occupant.

use super::bullet::BulletId;
use super::comment::CommentType;

/// Minimum gap between the show time of a scroll occupant and "now + gap"
pub const MIN_SCROLL_SPACING: f64 = 2.0;

/// Lane chosen for an accepted comment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneAssignment {
    pub lane: usize,
    /// Show time of the occupant being replaced
    pub prior_show_time: Option<f64>,
    /// Occupant being replaced
    pub displaced: Option<BulletId>,
}

/// Why a comment did not get a lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Lane count is zero
    NoLanes,
    /// Every pinned lane is occupied
    Saturated,
    /// The soonest-clearing scroll lane was shown too recently
    TooClose { occupant_show_time: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    Assigned(LaneAssignment),
    Rejected(Rejection),
}

impl Allocation {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Allocation::Assigned(_))
    }

    fn empty(lane: usize) -> Self {
        Allocation::Assigned(LaneAssignment {
            lane,
            prior_show_time: None,
            displaced: None,
        })
    }
}

/// Occupancy of one lane family
///
/// Slots grow on demand and are never truncated, so a bullet left in a lane
/// above a shrunk lane count is still found when the count grows back.
#[derive(Debug, Clone, Default)]
pub struct LaneSet {
    slots: Vec<Option<BulletId>>,
}

impl LaneSet {
    pub fn occupant(&self, lane: usize) -> Option<BulletId> {
        self.slots.get(lane).copied().flatten()
    }

    pub(crate) fn occupy(&mut self, lane: usize, id: BulletId) {
        if lane >= self.slots.len() {
            self.slots.resize(lane + 1, None);
        }
        self.slots[lane] = Some(id);
    }

    /// Clear `lane` if it still holds `id`
    pub(crate) fn vacate(&mut self, lane: usize, id: BulletId) -> bool {
        match self.slots.get_mut(lane) {
            Some(slot) if *slot == Some(id) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Occupied `(lane, bullet)` pairs
    pub fn occupied(&self) -> impl Iterator<Item = (usize, BulletId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(lane, slot)| slot.map(|id| (lane, id)))
    }
}

/// Lane sets of all three families
#[derive(Debug, Clone, Default)]
pub struct LaneTable {
    pub scroll: LaneSet,
    pub top: LaneSet,
    pub bottom: LaneSet,
}

impl LaneTable {
    pub fn family(&self, kind: CommentType) -> &LaneSet {
        match kind {
            CommentType::Scroll => &self.scroll,
            CommentType::Top => &self.top,
            CommentType::Bottom => &self.bottom,
        }
    }

    pub(crate) fn family_mut(&mut self, kind: CommentType) -> &mut LaneSet {
        match kind {
            CommentType::Scroll => &mut self.scroll,
            CommentType::Top => &mut self.top,
            CommentType::Bottom => &mut self.bottom,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.scroll.clear();
        self.top.clear();
        self.bottom.clear();
    }
}

/// Pick a scroll lane for a comment arriving at `now`
///
/// The scan stops at the first empty lane. Only when every lane is occupied is
/// the occupant with the smallest show time chosen (first one on ties). This is
/// not a global search over empty and occupied lanes, and must stay that way.
/// `show_time_of` returns `None` for ids that are no longer alive; such lanes
/// count as empty.
pub fn allocate_scroll(
    lanes: &LaneSet,
    lane_count: usize,
    force: bool,
    now: f64,
    show_time_of: impl Fn(BulletId) -> Option<f64>,
) -> Allocation {
    if lane_count == 0 {
        return Allocation::Rejected(Rejection::NoLanes);
    }

    let mut soonest: Option<(usize, BulletId, f64)> = None;
    for lane in 0..lane_count {
        let Some((id, show_time)) = lanes
            .occupant(lane)
            .and_then(|id| show_time_of(id).map(|t| (id, t)))
        else {
            return Allocation::empty(lane);
        };
        if soonest.is_none_or(|(_, _, best)| show_time < best) {
            soonest = Some((lane, id, show_time));
        }
    }

    let Some((lane, id, show_time)) = soonest else {
        return Allocation::Rejected(Rejection::NoLanes);
    };
    if !force && show_time < now + MIN_SCROLL_SPACING {
        return Allocation::Rejected(Rejection::TooClose {
            occupant_show_time: show_time,
        });
    }
    Allocation::Assigned(LaneAssignment {
        lane,
        prior_show_time: Some(show_time),
        displaced: Some(id),
    })
}

/// Pick a top or bottom lane: lowest empty lane, or lane 0 when forced
pub fn allocate_fixed(
    lanes: &LaneSet,
    lane_count: usize,
    force: bool,
    show_time_of: impl Fn(BulletId) -> Option<f64>,
) -> Allocation {
    if lane_count == 0 {
        return Allocation::Rejected(Rejection::NoLanes);
    }

    let is_free = |lane: usize| {
        lanes
            .occupant(lane)
            .and_then(|id| show_time_of(id))
            .is_none()
    };
    if let Some(lane) = (0..lane_count).find(|&lane| is_free(lane)) {
        return Allocation::empty(lane);
    }

    if force {
        let displaced = lanes.occupant(0);
        return Allocation::Assigned(LaneAssignment {
            lane: 0,
            prior_show_time: displaced.and_then(&show_time_of),
            displaced,
        });
    }
    Allocation::Rejected(Rejection::Saturated)
}
