//! Geometry primitives: signed 16-bit points, exclusive-max rectangles and
//! eight-way directions.
//!
//! Points pack losslessly into a `u32` and rectangles into a `u64`, which is
//! what lets the grid key observer topics by page origin and store a view's
//! whole viewport in a single atomic word.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

// ── Point ───────────────────────────────────────────────────────────────

/// A 2D world coordinate. Y grows southward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    #[inline(always)]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Packs the point into a `u32` as `(x << 16) | (y & 0xFFFF)`.
    /// The packing is a bijection over all representable points.
    #[inline(always)]
    pub const fn pack(self) -> u32 {
        ((self.x as u16 as u32) << 16) | (self.y as u16 as u32)
    }

    /// Recovers a point from its packed form.
    #[inline(always)]
    pub const fn unpack(v: u32) -> Self {
        Self::new((v >> 16) as i16, v as i16)
    }

    #[inline(always)]
    pub const fn mul_scalar(self, s: i16) -> Self {
        Self::new(self.x.wrapping_mul(s), self.y.wrapping_mul(s))
    }

    #[inline(always)]
    pub const fn div_scalar(self, s: i16) -> Self {
        Self::new(self.x / s, self.y / s)
    }

    /// The neighboring point one step towards `dir`.
    #[inline(always)]
    pub fn step(self, dir: Direction) -> Self {
        self + dir.vector(1)
    }

    /// Manhattan distance to `other`, always non-negative.
    #[inline(always)]
    pub fn manhattan(self, other: Point) -> u32 {
        let dx = (i32::from(self.x) - i32::from(other.x)).unsigned_abs();
        let dy = (i32::from(self.y) - i32::from(other.y)).unsigned_abs();
        dx + dy
    }

    /// Whether the point lies inside the box `(0,0)..size`.
    #[inline(always)]
    pub const fn within_size(self, size: Point) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < size.x && self.y < size.y
    }
}

impl Add for Point {
    type Output = Point;

    #[inline(always)]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x.wrapping_add(rhs.x), self.y.wrapping_add(rhs.y))
    }
}

impl Sub for Point {
    type Output = Point;

    #[inline(always)]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x.wrapping_sub(rhs.x), self.y.wrapping_sub(rhs.y))
    }
}

impl Mul for Point {
    type Output = Point;

    #[inline(always)]
    fn mul(self, rhs: Point) -> Point {
        Point::new(self.x.wrapping_mul(rhs.x), self.y.wrapping_mul(rhs.y))
    }
}

impl Div for Point {
    type Output = Point;

    #[inline(always)]
    fn div(self, rhs: Point) -> Point {
        Point::new(self.x / rhs.x, self.y / rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

// ── Direction ───────────────────────────────────────────────────────────

/// The 8 cardinal and intercardinal directions, clockwise from North.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Decodes a direction from its index, masked to the valid range.
    #[inline(always)]
    pub const fn from_index(i: u8) -> Direction {
        match i & 7 {
            0 => Direction::North,
            1 => Direction::NorthEast,
            2 => Direction::East,
            3 => Direction::SouthEast,
            4 => Direction::South,
            5 => Direction::SouthWest,
            6 => Direction::West,
            _ => Direction::NorthWest,
        }
    }

    #[inline(always)]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// The unit vector of the direction, scaled by `scale`.
    #[inline(always)]
    pub const fn vector(self, scale: i16) -> Point {
        let (dx, dy) = match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        };
        Point::new(dx * scale, dy * scale)
    }

    #[inline(always)]
    pub const fn opposite(self) -> Direction {
        Direction::from_index(self as u8 + 4)
    }

    /// The direction of the unit step from `from` to `to`.
    /// Identical points map to North.
    #[inline]
    pub fn between(from: Point, to: Point) -> Direction {
        match ((to.x - from.x).signum(), (to.y - from.y).signum()) {
            (0, -1) => Direction::North,
            (1, -1) => Direction::NorthEast,
            (1, 0) => Direction::East,
            (1, 1) => Direction::SouthEast,
            (0, 1) => Direction::South,
            (-1, 1) => Direction::SouthWest,
            (-1, 0) => Direction::West,
            (-1, -1) => Direction::NorthWest,
            _ => Direction::North,
        }
    }
}

// ── Rect ────────────────────────────────────────────────────────────────

/// An axis-aligned rectangle with inclusive `min` and exclusive `max`:
/// a point is inside iff `min.x <= x < max.x && min.y <= y < max.y`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

/// Sentinel for "no previous viewport". Empty, so it contains nothing and
/// intersects nothing.
pub(crate) const INVALID_RECT: Rect = Rect::new(-1, -1, -1, -1);

impl Rect {
    #[inline(always)]
    pub const fn new(x0: i16, y0: i16, x1: i16, y1: i16) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    #[inline(always)]
    pub const fn contains(self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Whether the two open rectangles share any point.
    #[inline(always)]
    pub const fn intersects(self, other: Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    #[inline(always)]
    pub fn size(self) -> Point {
        self.max - self.min
    }

    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    /// The part of `self` not covered by `other`, as up to four
    /// non-overlapping rectangles: a top band, a bottom band and the two
    /// side bands of the overlapping row range. Absent bands are empty.
    pub fn difference(self, other: Rect) -> [Rect; 4] {
        let mut out = [Rect::default(); 4];
        if self.is_empty() {
            return out;
        }
        if other.is_empty() || !self.intersects(other) {
            out[0] = self;
            return out;
        }

        if self.min.y < other.min.y {
            out[0] = Rect {
                min: self.min,
                max: Point::new(self.max.x, other.min.y),
            };
        }
        if self.max.y > other.max.y {
            out[1] = Rect {
                min: Point::new(self.min.x, other.max.y),
                max: self.max,
            };
        }

        let y0 = self.min.y.max(other.min.y);
        let y1 = self.max.y.min(other.max.y);
        if y0 < y1 {
            if self.min.x < other.min.x {
                out[2] = Rect::new(self.min.x, y0, other.min.x, y1);
            }
            if self.max.x > other.max.x {
                out[3] = Rect::new(other.max.x, y0, self.max.x, y1);
            }
        }
        out
    }

    /// Packs the four 16-bit components into one word, so a viewport can
    /// live in a single atomic.
    #[inline(always)]
    pub(crate) const fn pack(self) -> u64 {
        ((self.min.pack() as u64) << 32) | (self.max.pack() as u64)
    }

    #[inline(always)]
    pub(crate) const fn unpack(v: u64) -> Self {
        Self {
            min: Point::unpack((v >> 32) as u32),
            max: Point::unpack(v as u32),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_packs_to_known_values() {
        assert_eq!(Point::new(-5, 5).pack(), 0xFFFB_0005);
        assert_eq!(Point::new(10, 20).pack(), 0x000A_0014);
        assert_eq!(Point::unpack(0xFFFB_0005), Point::new(-5, 5));
    }

    #[test]
    fn point_packing_is_a_bijection() {
        for &x in &[i16::MIN, -300, -1, 0, 1, 7, 300, i16::MAX] {
            for &y in &[i16::MIN, -300, -1, 0, 1, 7, 300, i16::MAX] {
                let p = Point::new(x, y);
                assert_eq!(Point::unpack(p.pack()), p);
            }
        }
    }

    #[test]
    fn point_arithmetic() {
        let p = Point::new(10, 20);
        let q = Point::new(2, 2);
        assert_eq!(p + q, Point::new(12, 22));
        assert_eq!(p - q, Point::new(8, 18));
        assert_eq!(p * q, Point::new(20, 40));
        assert_eq!(p / q, Point::new(5, 10));
        assert_eq!(p.mul_scalar(2), Point::new(20, 40));
        assert_eq!(p.div_scalar(2), Point::new(5, 10));
        assert_eq!(p.to_string(), "10,20");
        assert_eq!(p.manhattan(Point::new(7, 24)), 7);
        assert!(!p.within_size(Point::new(10, 20)));
        assert!(p.within_size(Point::new(20, 30)));
    }

    #[test]
    fn direction_vectors() {
        let cases = [
            (Direction::North, Point::new(0, -1)),
            (Direction::South, Point::new(0, 1)),
            (Direction::East, Point::new(1, 0)),
            (Direction::West, Point::new(-1, 0)),
            (Direction::NorthEast, Point::new(1, -1)),
            (Direction::NorthWest, Point::new(-1, -1)),
            (Direction::SouthEast, Point::new(1, 1)),
            (Direction::SouthWest, Point::new(-1, 1)),
        ];
        for (dir, want) in cases {
            assert_eq!(Point::default().step(dir), want, "{dir:?}");
            assert_eq!(Direction::between(want, Point::default()), dir.opposite());
        }
    }

    #[test]
    fn direction_opposites_round_trip() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(
                dir.vector(3) + dir.opposite().vector(3),
                Point::default()
            );
        }
    }

    #[test]
    fn rect_contains_is_exclusive_max() {
        let r = Rect::new(0, 0, 2, 2);
        assert!(r.contains(Point::new(0, 0)));
        assert!(r.contains(Point::new(1, 1)));
        assert!(!r.contains(Point::new(2, 2)));
        assert!(!r.contains(Point::new(1, 2)));
        assert!(!r.contains(Point::new(2, 1)));
    }

    #[test]
    fn rect_intersects_is_strict() {
        assert!(Rect::new(0, 0, 2, 2).intersects(Rect::new(1, 0, 3, 2)));
        assert!(!Rect::new(0, 0, 2, 2).intersects(Rect::new(2, 0, 4, 2)));
        assert!(!Rect::new(10, 10, 12, 12).intersects(Rect::new(9, 12, 11, 14)));
    }

    #[test]
    fn rect_pack_round_trips() {
        for r in [
            Rect::new(0, 0, 2, 2),
            Rect::new(-1, -1, -1, -1),
            Rect::new(-300, 17, 12, 9000),
        ] {
            assert_eq!(Rect::unpack(r.pack()), r);
        }
        assert!(INVALID_RECT.is_empty());
    }

    // Brute-force point-set check: the returned bands must tile a \ b.
    fn assert_difference_covers(a: Rect, b: Rect) {
        let diff = a.difference(b);
        for x in -6..10i16 {
            for y in -6..10i16 {
                let p = Point::new(x, y);
                let want = a.contains(p) && !b.contains(p);
                let hits = diff.iter().filter(|r| r.contains(p)).count();
                assert_eq!(hits, usize::from(want), "({x},{y}) of {a:?} \\ {b:?}");
            }
        }
    }

    #[test]
    fn rect_difference_tiles_the_remainder() {
        let a = Rect::new(0, 0, 4, 4);
        for b in [
            Rect::new(2, 0, 6, 4),   // overlap right
            Rect::new(-2, 0, 2, 4),  // overlap left
            Rect::new(0, -2, 4, 2),  // overlap top
            Rect::new(0, 2, 4, 6),   // overlap bottom
            Rect::new(1, 1, 3, 3),   // hole
            Rect::new(-1, -1, 5, 5), // covered entirely
            Rect::new(6, 6, 8, 8),   // disjoint
            INVALID_RECT,            // sentinel
            Rect::new(2, 2, 6, 6),   // corner
        ] {
            assert_difference_covers(a, b);
        }
    }

    #[test]
    fn rect_difference_bands_do_not_overlap() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(1, 1, 3, 3);
        let diff = a.difference(b);
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!(
                    diff[i].is_empty() || diff[j].is_empty() || !diff[i].intersects(diff[j])
                );
            }
        }
    }
}
