//! Cursors: transient handles to one tile of one grid.
//!
//! A cursor is the only way to read or mutate tile state. It is three
//! words (grid, page and intra-page index) and is produced on demand by
//! [`Grid::at`] and the iteration methods, never stored.

use std::hash::Hash;
use std::sync::atomic::Ordering;

use crate::geom::{Point, Rect};
use crate::grid::page::Page;
use crate::grid::Grid;
use crate::view::{Update, ValueAt};
use crate::Value;

pub struct Cursor<'g, T = ()> {
    pub(crate) grid: &'g Grid<T>,
    pub(crate) page: &'g Page<T>,
    pub(crate) idx: u8,
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<'g, T> Cursor<'g, T> {
    /// The world coordinate of this tile.
    #[inline(always)]
    pub fn point(&self) -> Point {
        self.page.point_of(self.idx)
    }

    /// The current tile value. A single atomic load; readers see either
    /// the pre-image or the post-image of a concurrent mutation, never a
    /// torn word.
    #[inline(always)]
    pub fn value(&self) -> Value {
        self.page.load(self.idx)
    }

    /// Invokes `f` with the viewport of every view observing this tile.
    pub fn observers(&self, mut f: impl FnMut(Rect)) {
        let at = self.point();
        self.grid
            .observers
            .each(self.page.point(), at, |sub| f(sub.viewport()));
    }
}

impl<'g, T: Clone> Cursor<'g, T> {
    /// Stores `value`, observing the exact prior word in the same atomic
    /// operation so the update notification carries a true pre-image.
    pub fn write(&self, value: Value) {
        let prev = self.page.tile(self.idx).swap(value, Ordering::SeqCst);
        self.publish_value(prev, value);
    }

    /// Atomically replaces the tile with `f(current)`, retrying until the
    /// compare-and-swap lands. `f` must be pure: it runs again on every
    /// retry. Returns the post-image.
    pub fn merge(&self, f: impl Fn(Value) -> Value) -> Value {
        let slot = self.page.tile(self.idx);
        let mut current = slot.load(Ordering::SeqCst);
        loop {
            let next = f(current);
            match slot.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {
                    self.publish_value(current, next);
                    return next;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Overwrites only the bits selected by `mask`. Returns the post-image.
    #[inline]
    pub fn mask(&self, value: Value, mask: Value) -> Value {
        self.merge(|v| (v & !mask) | (value & mask))
    }

    /// Dispatches a value-change update when the page is observed. The
    /// flag test is deliberately racy: a view subscribing concurrently may
    /// miss this one notification.
    fn publish_value(&self, old: Value, new: Value) {
        if !self.page.is_observed() {
            return;
        }
        let at = self.point();
        let ev = Update {
            old: ValueAt {
                point: at,
                value: old,
            },
            new: ValueAt {
                point: at,
                value: new,
            },
            add: None,
            del: None,
        };
        self.grid.observers.notify(&ev, self.page.point(), at);
    }
}

impl<'g, T: Eq + Hash + Clone> Cursor<'g, T> {
    /// Number of entities on this tile.
    pub fn count(&self) -> usize {
        self.page.count_entities(self.idx)
    }

    /// Invokes `f` for every entity on this tile, under the page lock.
    pub fn range(&self, f: impl FnMut(&T)) {
        self.page.each_entity(self.idx, f);
    }

    /// Places `entity` on this tile. Adding the same entity elsewhere
    /// overwrites the previous placement; use [`Cursor::move_to`] to
    /// relocate.
    pub fn add(&self, entity: T) {
        let announce = self.page.is_observed().then(|| entity.clone());
        self.page.insert_entity(entity, self.idx);
        if let Some(entity) = announce {
            self.publish_entity(None, Some(entity));
        }
    }

    /// Removes `entity` from this tile's page if present.
    pub fn del(&self, entity: T) {
        self.page.remove_entity(&entity);
        if self.page.is_observed() {
            self.publish_entity(Some(entity), None);
        }
    }

    /// Moves `entity` from this tile to `dst`.
    ///
    /// The source delete and destination insert are separate critical
    /// sections; a concurrent reader may briefly observe the entity in
    /// neither tile. Exactly one update is dispatched, covering both
    /// endpoints. A destination outside the world returns `false` without
    /// touching state, though source-side observers still see the
    /// departure.
    pub fn move_to(&self, entity: T, dst: Point) -> bool {
        let old = ValueAt {
            point: self.point(),
            value: self.value(),
        };

        let Some(target) = self.grid.at(dst.x, dst.y) else {
            if self.page.is_observed() {
                let ev = Update {
                    old,
                    new: ValueAt {
                        point: dst,
                        value: 0,
                    },
                    add: Some(entity.clone()),
                    del: Some(entity),
                };
                self.grid.observers.notify_pair(
                    &ev,
                    [self.page.point(), self.page.point()],
                    [old.point, dst],
                );
            }
            return false;
        };

        self.page.remove_entity(&entity);
        target.page.insert_entity(entity.clone(), target.idx);

        let new = ValueAt {
            point: target.point(),
            value: target.value(),
        };
        let ev = Update {
            old,
            new,
            add: Some(entity.clone()),
            del: Some(entity),
        };

        let src = self.page.point();
        let dst_page = target.page.point();
        let pages = match (self.page.is_observed(), target.page.is_observed()) {
            (false, false) => return true,
            _ if src == dst_page => [src, src],
            (true, false) => [src, src],
            (false, true) => [dst_page, dst_page],
            (true, true) => [src, dst_page],
        };
        self.grid
            .observers
            .notify_pair(&ev, pages, [old.point, new.point]);
        true
    }

    fn publish_entity(&self, del: Option<T>, add: Option<T>) {
        let at = ValueAt {
            point: self.point(),
            value: self.value(),
        };
        let ev = Update {
            old: at,
            new: at,
            add,
            del,
        };
        self.grid.observers.notify(&ev, self.page.point(), at.point);
    }
}
