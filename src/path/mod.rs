//! Spatial search over the grid: A* path-finding and bounded breadth-first
//! expansion, both fed by the bucketed [`Frontier`].
//!
//! Per-search state (the edge table and the frontier) is drawn from a pool
//! owned by the grid, sized by the `π·d²` disc the search is expected to
//! touch, and returned cleared but with capacity intact.

mod frontier;

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use ahash::AHashMap;

use crate::geom::{Direction, Point};
use crate::grid::{Cursor, Grid};
use crate::Value;
use frontier::Frontier;

// An edge table entry: the cost to reach a point, and the direction the
// point was entered by, packed as `(cost << 4) | direction`.
const EDGE_COST_SHIFT: u32 = 4;
const EDGE_DIR_MASK: u32 = 0xF;

#[inline(always)]
fn encode_edge(cost: u32, entered: Direction) -> u32 {
    (cost << EDGE_COST_SHIFT) | u32::from(entered.index())
}

impl<T> Grid<T> {
    /// Finds a cheapest four-neighbor path between two tiles.
    ///
    /// `cost` maps a tile value to its traversal cost; zero blocks the
    /// tile. Returns the point sequence from `from` to `to` inclusive and
    /// the total cost, or `None` when no path exists. Ties are broken
    /// towards recently discovered tiles, which affects path shape but not
    /// cost.
    pub fn path(
        &self,
        from: Point,
        to: Point,
        cost: impl Fn(Value) -> u16,
    ) -> Option<(Vec<Point>, u32)> {
        let hint = area_hint(from.manhattan(to), self.size());
        let mut search = self.searches.acquire(hint);
        let SearchState { edges, frontier } = &mut *search;

        frontier.push(from.pack(), 0);
        edges.insert(from.pack(), encode_edge(0, Direction::North));

        while let Some(packed) = frontier.pop() {
            let current = Point::unpack(packed);
            if current == to {
                return Some(reconstruct(edges, from, to));
            }

            let current_cost = edges.get(&packed).copied().unwrap_or(0) >> EDGE_COST_SHIFT;
            self.neighbors(current.x, current.y, |next: Cursor<'_, T>| {
                let step = cost(next.value());
                if step == 0 {
                    return;
                }
                let next_point = next.point();
                let next_cost = current_cost + u32::from(step);
                let known = edges
                    .get(&next_point.pack())
                    .map(|&e| e >> EDGE_COST_SHIFT);
                if known.is_none_or(|c| next_cost < c) {
                    edges.insert(
                        next_point.pack(),
                        encode_edge(next_cost, Direction::between(current, next_point)),
                    );
                    frontier.push(next_point.pack(), next_cost + next_point.manhattan(to));
                }
            });
        }
        None
    }

    /// Visits every passable tile reachable from `from` within `radius`
    /// Manhattan steps, starting with `from` itself. Expansion is
    /// breadth-first over four-neighbors; blocked tiles stop it.
    pub fn around(
        &self,
        from: Point,
        radius: u32,
        cost: impl Fn(Value) -> u16,
        mut f: impl FnMut(Cursor<'_, T>),
    ) {
        let Some(start) = self.at(from.x, from.y) else {
            return;
        };
        f(start);

        let mut search = self.searches.acquire(area_hint(radius, self.size()));
        let SearchState { edges: reached, frontier } = &mut *search;

        frontier.push(from.pack(), 0);
        reached.insert(from.pack(), 0);

        while let Some(packed) = frontier.pop() {
            let current = Point::unpack(packed);
            self.neighbors(current.x, current.y, |next: Cursor<'_, T>| {
                let next_point = next.point();
                if from.manhattan(next_point) > radius {
                    return;
                }
                if cost(next.value()) == 0 {
                    return;
                }
                if reached.insert(next_point.pack(), 0).is_none() {
                    frontier.push(next_point.pack(), 1);
                    f(next);
                }
            });
        }
    }
}

/// Walks the edge table backwards from `to`, stepping opposite each stored
/// entry direction until `from`, then reverses into forward order.
fn reconstruct(edges: &AHashMap<u32, u32>, from: Point, to: Point) -> (Vec<Point>, u32) {
    let total = edges.get(&to.pack()).copied().unwrap_or(0) >> EDGE_COST_SHIFT;
    let mut points = Vec::with_capacity(total as usize + 1);
    let mut current = to;
    loop {
        points.push(current);
        if current == from {
            break;
        }
        let Some(&edge) = edges.get(&current.pack()) else {
            break;
        };
        let entered = Direction::from_index((edge & EDGE_DIR_MASK) as u8);
        current = current.step(entered.opposite());
    }
    points.reverse();
    (points, total)
}

/// The `π·d²` disc a search of reach `d` is expected to touch, clamped to
/// the grid area.
fn area_hint(d: u32, size: Point) -> usize {
    let d = f64::from(d);
    let disc = (std::f64::consts::PI * d * d) as u64;
    let grid = size.x as u64 * size.y as u64;
    disc.min(grid) as usize
}

// ── Search-state pool ───────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct SearchState {
    edges: AHashMap<u32, u32>,
    frontier: Frontier,
}

/// Reusable search states. Safe to borrow from concurrently; each borrow
/// holds the pool lock only long enough to pop or push one entry.
pub(crate) struct SearchPool {
    idle: Mutex<Vec<SearchState>>,
}

impl SearchPool {
    pub fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire(&self, capacity: usize) -> PooledSearch<'_> {
        let mut state = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_default();
        let additional = capacity.saturating_sub(state.edges.capacity());
        state.edges.reserve(additional);
        PooledSearch {
            pool: self,
            state: Some(state),
        }
    }
}

pub(crate) struct PooledSearch<'p> {
    pool: &'p SearchPool,
    state: Option<SearchState>,
}

impl Deref for PooledSearch<'_> {
    type Target = SearchState;

    fn deref(&self) -> &SearchState {
        self.state.as_ref().expect("pooled search already released")
    }
}

impl DerefMut for PooledSearch<'_> {
    fn deref_mut(&mut self) -> &mut SearchState {
        self.state.as_mut().expect("pooled search already released")
    }
}

impl Drop for PooledSearch<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.edges.clear();
            state.frontier.reset();
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(state);
        }
    }
}
