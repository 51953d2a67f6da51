//! The grid storage engine.
//!
//! A grid is a dense, row-major array of 3×3 [`Page`]s allocated once at
//! construction. Tile words are mutated through lock-free single-word
//! atomics; the per-page entity map takes the page mutex. Observer routing
//! and the path-finder search pool are owned by the grid so no process
//! globals are needed.

mod codec;
mod cursor;
pub(crate) mod page;

pub use codec::CodecError;
pub use cursor::Cursor;

use crate::geom::{Point, Rect};
use crate::path::SearchPool;
use crate::view::Pubsub;
use crate::Value;
use page::{Page, TILES_PER_PAGE};

/// A 2D tile map composed of 3×3 pages. `T` is the entity type stored in
/// per-tile state sets.
pub struct Grid<T = ()> {
    pages: Box<[Page<T>]>,
    page_width: i16,
    size: Point,
    pub(crate) observers: Pubsub<T>,
    pub(crate) searches: SearchPool,
}

impl<T> std::fmt::Debug for Grid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("page_width", &self.page_width)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl<T> Grid<T> {
    /// Creates a grid of the given size. Dimensions are truncated down to
    /// the nearest multiple of three.
    ///
    /// Panics when either dimension is non-positive.
    pub fn new(width: i16, height: i16) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        let page_width = width / 3;
        let page_height = height / 3;
        let count = page_width as usize * page_height as usize;

        let pages = (0..count)
            .map(|i| {
                let x = (i % page_width as usize) as i16;
                let y = (i / page_width as usize) as i16;
                Page::new(Point::new(x, y).mul_scalar(3))
            })
            .collect();

        Self {
            pages,
            page_width,
            size: Point::new(page_width * 3, page_height * 3),
            observers: Pubsub::new(),
            searches: SearchPool::new(),
        }
    }

    /// The world size in tiles.
    #[inline(always)]
    pub fn size(&self) -> Point {
        self.size
    }

    #[inline(always)]
    fn page_index(&self, px: i16, py: i16) -> usize {
        px as usize + self.page_width as usize * py as usize
    }

    /// A cursor for the tile at `(x, y)`, or `None` out of bounds.
    #[inline]
    pub fn at(&self, x: i16, y: i16) -> Option<Cursor<'_, T>> {
        if !Point::new(x, y).within_size(self.size) {
            return None;
        }
        Some(Cursor {
            grid: self,
            page: &self.pages[self.page_index(x / 3, y / 3)],
            idx: ((y % 3) * 3 + (x % 3)) as u8,
        })
    }

    /// Iterates every tile of the grid in page order, NW..SE within each
    /// page.
    pub fn each(&self, mut f: impl FnMut(Cursor<'_, T>)) {
        for page in self.pages.iter() {
            for idx in 0..TILES_PER_PAGE as u8 {
                f(Cursor {
                    grid: self,
                    page,
                    idx,
                });
            }
        }
    }

    /// Iterates every tile with `nw.x <= x < se.x && nw.y <= y < se.y`,
    /// clipped to the grid.
    pub fn within(&self, nw: Point, se: Point, mut f: impl FnMut(Cursor<'_, T>)) {
        let bounds = Rect { min: nw, max: se };
        self.pages_within(bounds, |page| {
            for idx in 0..TILES_PER_PAGE as u8 {
                if bounds.contains(page.point_of(idx)) {
                    f(Cursor {
                        grid: self,
                        page,
                        idx,
                    });
                }
            }
        });
    }

    /// Iterates the four cardinal neighbors of `(x, y)` in N, E, S, W
    /// order, skipping any that fall outside the grid.
    pub fn neighbors(&self, x: i16, y: i16, mut f: impl FnMut(Cursor<'_, T>)) {
        if !Point::new(x, y).within_size(self.size) {
            return;
        }
        for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
            if let Some(cursor) = self.at(x + dx, y + dy) {
                f(cursor);
            }
        }
    }

    /// Visits every page whose 3×3 block overlaps `bounds`, row by row.
    /// This is the covering enumeration shared by iteration, the codec and
    /// viewport diffing.
    pub(crate) fn pages_within(&self, bounds: Rect, mut f: impl FnMut(&Page<T>)) {
        let min_x = bounds.min.x.max(0);
        let min_y = bounds.min.y.max(0);
        let max_x = bounds.max.x.min(self.size.x);
        let max_y = bounds.max.y.min(self.size.y);
        if min_x >= max_x || min_y >= max_y {
            return;
        }
        for py in (min_y / 3)..=((max_y - 1) / 3) {
            for px in (min_x / 3)..=((max_x - 1) / 3) {
                f(&self.pages[self.page_index(px, py)]);
            }
        }
    }
}

impl<T: Clone> Grid<T> {
    /// Stores `value` at `(x, y)`. Out-of-bounds coordinates are a silent
    /// no-op.
    #[inline]
    pub fn write_at(&self, x: i16, y: i16, value: Value) {
        if let Some(cursor) = self.at(x, y) {
            cursor.write(value);
        }
    }

    /// Overwrites only the bits of `mask` at `(x, y)`.
    #[inline]
    pub fn mask_at(&self, x: i16, y: i16, value: Value, mask: Value) {
        if let Some(cursor) = self.at(x, y) {
            cursor.mask(value, mask);
        }
    }

    /// Atomically applies `f` to the tile at `(x, y)`, retrying on
    /// contention. `f` must be pure.
    #[inline]
    pub fn merge_at(&self, x: i16, y: i16, f: impl Fn(Value) -> Value) {
        if let Some(cursor) = self.at(x, y) {
            cursor.merge(f);
        }
    }
}
