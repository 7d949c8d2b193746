//! Bullet pool
//!
//! Arena of bullet slots plus a free-list of retired slots. A slot is either
//! alive or free, never both; acquiring pops the free-list before growing the
//! arena, and liveness is a flag per slot, so steady-state playback does not
//! allocate.

use super::bullet::{Bullet, BulletId, BulletSetting, MotionContext};
use super::comment::CommentItem;

#[derive(Debug, Default)]
pub struct BulletPool {
    slots: Vec<Bullet>,
    /// Per-slot alive flag, parallel to `slots`
    live: Vec<bool>,
    free: Vec<BulletId>,
    alive_count: usize,
}

impl BulletPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revive a retired bullet, or build a new one if the free-list is empty
    pub(crate) fn acquire(
        &mut self,
        item: &CommentItem,
        setting: BulletSetting,
        motion: &MotionContext,
        custom_color: bool,
    ) -> BulletId {
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.index()].init(item, setting, motion, custom_color);
                self.live[id.index()] = true;
                id
            }
            None => {
                let id = BulletId(self.slots.len());
                self.slots
                    .push(Bullet::new(id, item, setting, motion, custom_color));
                self.live.push(true);
                id
            }
        };
        self.alive_count += 1;
        id
    }

    /// Return an alive bullet to the free-list
    ///
    /// Returns `false` if the bullet was not alive (already pooled or unknown).
    pub(crate) fn release(&mut self, id: BulletId) -> bool {
        match self.live.get_mut(id.index()) {
            Some(live) if *live => {
                *live = false;
                self.alive_count -= 1;
                self.free.push(id);
                true
            }
            _ => false,
        }
    }

    /// Retire every alive bullet
    pub(crate) fn release_all(&mut self) -> usize {
        let count = self.alive_count;
        for (index, live) in self.live.iter_mut().enumerate() {
            if *live {
                *live = false;
                self.free.push(BulletId(index));
            }
        }
        self.alive_count = 0;
        count
    }

    pub fn get(&self, id: BulletId) -> Option<&Bullet> {
        if self.is_alive(id) {
            self.slots.get(id.index())
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, id: BulletId) -> Option<&mut Bullet> {
        if self.is_alive(id) {
            self.slots.get_mut(id.index())
        } else {
            None
        }
    }

    pub fn is_alive(&self, id: BulletId) -> bool {
        self.live.get(id.index()).copied().unwrap_or(false)
    }

    /// Alive bullets in id order
    pub fn alive(&self) -> impl Iterator<Item = &Bullet> + '_ {
        self.slots
            .iter()
            .zip(&self.live)
            .filter_map(|(bullet, live)| live.then_some(bullet))
    }

    /// Apply `f` to every alive bullet
    pub(crate) fn for_each_alive(&mut self, mut f: impl FnMut(&mut Bullet)) {
        for (bullet, live) in self.slots.iter_mut().zip(&self.live) {
            if *live {
                f(bullet);
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Total bullets ever constructed
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether the free-list and the alive slots are disjoint and cover the arena
    pub fn is_consistent(&self) -> bool {
        let mut pooled = vec![false; self.slots.len()];
        for id in &self.free {
            match pooled.get_mut(id.index()) {
                Some(seen) if !*seen && !self.live[id.index()] => *seen = true,
                _ => return false,
            }
        }
        let live = self.live.iter().filter(|live| **live).count();
        live == self.alive_count && live + self.free.len() == self.slots.len()
    }
}
