//! Views: rectangular viewports over a grid that receive incremental
//! updates for the tiles they cover.
//!
//! A view owns the receiving end of a bounded inbox; the registry side
//! holds only a [`Subscriber`] handle (viewport word + sender), so
//! subscribers never own the grid and the grid → registry → view cycle is
//! broken by construction. The inbox applies back-pressure: writers into
//! an undrained viewport block, so every view owner must keep a task
//! draining `inbox`.

mod pubsub;

pub use pubsub::{Update, ValueAt};
pub(crate) use pubsub::{Pubsub, Subscriber};

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use smallvec::SmallVec;
use tracing::trace;

use crate::geom::{Direction, Point, Rect, INVALID_RECT};
use crate::grid::{Cursor, Grid};
use crate::Value;

const INBOX_CAPACITY: usize = 32;

/// A movable viewport over a grid. `S` is arbitrary user state carried by
/// the view; `T` is the grid's entity type.
pub struct View<S, T = ()> {
    grid: Arc<Grid<T>>,
    sub: Arc<Subscriber<T>>,
    /// Update notifications for tiles inside the viewport.
    pub inbox: Receiver<Update<T>>,
    /// Arbitrary user state.
    pub state: S,
}

impl<S, T> View<S, T> {
    /// Creates a view with an empty viewport. Call [`View::resize`] to
    /// start observing.
    pub fn new(grid: &Arc<Grid<T>>, state: S) -> Self {
        let (sender, inbox) = bounded(INBOX_CAPACITY);
        Self {
            grid: Arc::clone(grid),
            sub: Arc::new(Subscriber::new(sender)),
            inbox,
            state,
        }
    }

    /// The grid this view observes.
    #[inline(always)]
    pub fn grid(&self) -> &Arc<Grid<T>> {
        &self.grid
    }

    /// The current viewport rectangle.
    #[inline(always)]
    pub fn viewport(&self) -> Rect {
        self.sub.viewport()
    }

    /// Replaces the viewport, subscribing to pages that entered it and
    /// unsubscribing from pages that left. `on_enter` runs for every tile
    /// that is inside the new rectangle but was not inside the previous
    /// one; on the first resize that is the whole rectangle.
    pub fn resize(&self, rect: Rect, mut on_enter: impl FnMut(Cursor<'_, T>)) {
        let prev = self.sub.swap_viewport(rect);
        self.retarget(prev, rect);
        for band in rect.difference(prev) {
            if !band.is_empty() {
                self.grid.within(band.min, band.max, &mut on_enter);
            }
        }
    }

    /// Translates the viewport by `(x, y)`.
    pub fn move_by(&self, x: i16, y: i16, on_enter: impl FnMut(Cursor<'_, T>)) {
        let r = self.viewport();
        let delta = Point::new(x, y);
        self.resize(
            Rect {
                min: r.min + delta,
                max: r.max + delta,
            },
            on_enter,
        );
    }

    /// Moves the viewport so its north-west corner lands on `nw`.
    pub fn move_at(&self, nw: Point, on_enter: impl FnMut(Cursor<'_, T>)) {
        let r = self.viewport();
        self.resize(
            Rect {
                min: nw,
                max: nw + r.size(),
            },
            on_enter,
        );
    }

    /// Slides the viewport `distance` tiles towards `dir`.
    pub fn move_to(&self, dir: Direction, distance: i16, on_enter: impl FnMut(Cursor<'_, T>)) {
        let delta = dir.vector(distance);
        let r = self.viewport();
        self.resize(
            Rect {
                min: r.min + delta,
                max: r.max + delta,
            },
            on_enter,
        );
    }

    /// Iterates every tile currently inside the viewport.
    pub fn each(&self, f: impl FnMut(Cursor<'_, T>)) {
        let r = self.viewport();
        self.grid.within(r.min, r.max, f);
    }

    /// A cursor into the underlying grid.
    #[inline]
    pub fn at(&self, x: i16, y: i16) -> Option<Cursor<'_, T>> {
        self.grid.at(x, y)
    }

    /// Unsubscribes from every observed page. Idempotent; also runs on
    /// drop. After `close` returns, at most one already-dispatched
    /// straggler update can still arrive.
    pub fn close(&self) {
        let prev = self.sub.swap_viewport(INVALID_RECT);
        if prev.is_empty() {
            return;
        }
        self.grid.pages_within(prev, |page| {
            if self.grid.observers.unsubscribe(page.point(), &self.sub) {
                page.set_observed(false);
            }
        });
        trace!(viewport = ?prev, "view closed");
    }

    /// Classifies every page touched by the viewport change exactly once:
    /// pages now inside subscribe and set the observed flag before they
    /// land in the list; pages now outside unsubscribe and clear the flag
    /// only when the last observer left.
    fn retarget(&self, prev: Rect, next: Rect) {
        let mut seen: SmallVec<[u32; 16]> = SmallVec::new();
        let bands = next
            .difference(prev)
            .into_iter()
            .chain(prev.difference(next));
        for band in bands {
            if band.is_empty() {
                continue;
            }
            self.grid.pages_within(band, |page| {
                let origin = page.point();
                if seen.contains(&origin.pack()) {
                    return;
                }
                seen.push(origin.pack());

                let bounds = page.bounds();
                if next.intersects(bounds) && !prev.intersects(bounds) {
                    page.set_observed(true);
                    self.grid.observers.subscribe(origin, Arc::clone(&self.sub));
                } else if prev.intersects(bounds) && !next.intersects(bounds) {
                    if self.grid.observers.unsubscribe(origin, &self.sub) {
                        page.set_observed(false);
                    }
                }
            });
        }
    }
}

impl<S, T: Clone> View<S, T> {
    /// Stores `value` at `(x, y)` through the grid.
    #[inline]
    pub fn write_at(&self, x: i16, y: i16, value: Value) {
        self.grid.write_at(x, y, value);
    }

    /// Overwrites only the bits of `mask` at `(x, y)` through the grid.
    #[inline]
    pub fn merge_at(&self, x: i16, y: i16, value: Value, mask: Value) {
        self.grid.mask_at(x, y, value, mask);
    }
}

impl<S, T> Drop for View<S, T> {
    fn drop(&mut self) {
        self.close();
    }
}
