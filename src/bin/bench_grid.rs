//! Wall-clock micro-benchmarks for the grid hot paths.
//!
//! Not a statistics suite; prints per-op averages for quick regression
//! checks after touching storage, dispatch or search internals.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tilescape::{Grid, Point, Rect, View};

fn time<R>(label: &str, iterations: u64, mut op: impl FnMut() -> R) {
    let start = Instant::now();
    for _ in 0..iterations {
        std::hint::black_box(op());
    }
    let elapsed = start.elapsed();
    let per_op = elapsed.as_nanos() as f64 / iterations as f64;
    println!("{label:<24} {iterations:>10} iters  {per_op:>10.1} ns/op");
}

fn scatter_obstacles(grid: &Grid, density: f64, rng: &mut StdRng) {
    let size = grid.size();
    for y in 0..size.y {
        for x in 0..size.x {
            if rng.gen_bool(density) {
                grid.write_at(x, y, 1);
            }
        }
    }
}

fn main() {
    let mut rng = StdRng::seed_from_u64(0x7117_E5CA_9E00_0001);

    let grid: Arc<Grid> = Arc::new(Grid::new(768, 768));

    time("at", 20_000_000, || grid.at(100, 100).map(|c| c.value()));
    time("write", 20_000_000, || grid.write_at(100, 100, 0));
    time("merge", 20_000_000, || {
        grid.merge_at(100, 100, |v| v.wrapping_add(1))
    });
    time("mask", 20_000_000, || grid.mask_at(100, 100, 0, 1));

    time("within 100x100", 20_000, || {
        let mut tiles = 0u32;
        grid.within(Point::new(100, 100), Point::new(200, 200), |_| tiles += 1);
        tiles
    });

    time("neighbors", 20_000_000, || {
        let mut n = 0u32;
        grid.neighbors(300, 300, |_| n += 1);
        n
    });

    let maze: Grid = Grid::new(300, 300);
    scatter_obstacles(&maze, 0.2, &mut rng);
    let passable = |v: u32| if v & 1 != 0 { 0 } else { 1 };

    time("path 300x300", 2_000, || {
        maze.path(Point::new(1, 1), Point::new(298, 298), passable)
    });
    time("around r=10", 50_000, || {
        let mut n = 0u32;
        maze.around(Point::new(150, 150), 10, passable, |_| n += 1);
        n
    });

    let view = View::new(&grid, ());
    view.resize(Rect::new(100, 0, 200, 100), |_| {});
    let corners = [Point::new(100, 0), Point::new(200, 100)];
    let mut flip = 0usize;
    time("view move", 5_000, || {
        flip ^= 1;
        view.move_at(corners[flip], |_| {});
    });

    view.close();
}
