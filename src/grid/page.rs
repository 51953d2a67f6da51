//! A page is a 3×3 block of tiles, the unit of spatial indexing and of
//! observer addressing.
//!
//! Layout is chosen to keep one page on a single cache line on 64-bit
//! targets:
//! - nine `AtomicU32` tile words, 36 bytes, individually CAS-able
//! - the world origin of the page, always a multiple of 3
//! - an atomic flags word; bit 0 = observed by at least one view
//! - a mutex-guarded, lazily boxed entity map (entity → tile index 0..=8)
//!
//! Tile words never take the mutex; the mutex only guards the entity map.
//! Pages are created during grid construction and never move, so their
//! origin point doubles as a stable identity for observer routing.

use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use ahash::AHashMap;

use crate::geom::{Point, Rect};
use crate::Value;

pub(crate) const TILES_PER_PAGE: usize = 9;

const FLAG_OBSERVED: u32 = 1 << 0;

type StateMap<T> = Option<Box<AHashMap<T, u8>>>;

pub(crate) struct Page<T> {
    tiles: [AtomicU32; TILES_PER_PAGE],
    point: Point,
    flags: AtomicU32,
    state: Mutex<StateMap<T>>,
}

impl<T> Page<T> {
    pub fn new(point: Point) -> Self {
        Self {
            tiles: std::array::from_fn(|_| AtomicU32::new(0)),
            point,
            flags: AtomicU32::new(0),
            state: Mutex::new(None),
        }
    }

    #[inline(always)]
    pub fn point(&self) -> Point {
        self.point
    }

    #[inline(always)]
    pub fn bounds(&self) -> Rect {
        Rect {
            min: self.point,
            max: self.point + Point::new(3, 3),
        }
    }

    /// The world coordinate of tile `idx` within this page. The intra-page
    /// order is fixed: NW, N, NE, W, C, E, SW, S, SE.
    #[inline(always)]
    pub fn point_of(&self, idx: u8) -> Point {
        self.point + Point::new(i16::from(idx % 3), i16::from(idx / 3))
    }

    #[inline(always)]
    pub fn tile(&self, idx: u8) -> &AtomicU32 {
        &self.tiles[idx as usize]
    }

    #[inline(always)]
    pub fn load(&self, idx: u8) -> Value {
        self.tiles[idx as usize].load(Ordering::SeqCst)
    }

    #[inline(always)]
    pub fn is_observed(&self) -> bool {
        self.flags.load(Ordering::SeqCst) & FLAG_OBSERVED != 0
    }

    pub fn set_observed(&self, observed: bool) {
        if observed {
            self.flags.fetch_or(FLAG_OBSERVED, Ordering::SeqCst);
        } else {
            self.flags.fetch_and(!FLAG_OBSERVED, Ordering::SeqCst);
        }
    }

    /// Runs `f` with the entity map locked, recovering from poison: the
    /// map is plain data and stays valid if a panicking thread held it.
    #[inline]
    fn with_state<R>(&self, f: impl FnOnce(&mut StateMap<T>) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl<T: Eq + Hash> Page<T> {
    /// Inserts or overwrites the entity's tile index.
    pub fn insert_entity(&self, entity: T, idx: u8) {
        self.with_state(|state| {
            state
                .get_or_insert_with(|| Box::new(AHashMap::new()))
                .insert(entity, idx);
        });
    }

    /// Removes the entity if present.
    pub fn remove_entity(&self, entity: &T) {
        self.with_state(|state| {
            if let Some(map) = state {
                map.remove(entity);
            }
        });
    }

    /// Number of entities on tile `idx`.
    pub fn count_entities(&self, idx: u8) -> usize {
        self.with_state(|state| match state {
            Some(map) => map.values().filter(|&&at| at == idx).count(),
            None => 0,
        })
    }

    /// Invokes `f` for each entity on tile `idx`, under the page lock.
    pub fn each_entity(&self, idx: u8, mut f: impl FnMut(&T)) {
        self.with_state(|state| {
            if let Some(map) = state {
                for (entity, &at) in map.iter() {
                    if at == idx {
                        f(entity);
                    }
                }
            }
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
