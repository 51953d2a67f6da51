use tilescape::{Grid, Point, Value};

/// Builds a grid from rows of `#` (wall) and `.` (open). Walls get an odd
/// tile value so `passable` reports them blocked.
fn grid_from(rows: &[&str]) -> Grid {
    let height = rows.len() as i16;
    let width = rows[0].len() as i16;
    let grid = Grid::new(width, height);
    for (y, row) in rows.iter().enumerate() {
        assert_eq!(row.len() as i16, width, "ragged fixture row {y}");
        for (x, cell) in row.bytes().enumerate() {
            if cell == b'#' {
                grid.write_at(x as i16, y as i16, 0xFF);
            }
        }
    }
    grid
}

fn passable(v: Value) -> u16 {
    if v & 1 != 0 {
        0
    } else {
        1
    }
}

/// The 9×9 obstacle course used across the search tests: a walled border
/// with interior baffles that force a winding route.
const MAZE: &[&str] = &[
    "#########",
    "#...#...#",
    "#..###.##",
    "#....#.##",
    "###..#..#",
    "#.......#",
    "#####.###",
    "#.......#",
    "#########",
];

fn assert_walkable(grid: &Grid, path: &[Point]) {
    for pair in path.windows(2) {
        assert_eq!(pair[0].manhattan(pair[1]), 1, "gap between {} and {}", pair[0], pair[1]);
    }
    for p in path {
        let value = grid.at(p.x, p.y).expect("path leaves the grid").value();
        assert_ne!(passable(value), 0, "path crosses wall at {p}");
    }
}

#[test]
fn path_threads_the_maze() {
    let grid = grid_from(MAZE);
    let (path, cost) = grid
        .path(Point::new(1, 1), Point::new(7, 7), passable)
        .expect("maze is solvable");

    assert_eq!(cost, 12);
    assert_eq!(path.len(), 13);
    assert_eq!(path[0], Point::new(1, 1));
    assert_eq!(path[12], Point::new(7, 7));
    assert_walkable(&grid, &path);
}

#[test]
fn path_on_an_open_grid_is_straight_cost() {
    let grid: Grid = Grid::new(6, 6);
    let (path, cost) = grid
        .path(Point::new(0, 0), Point::new(5, 5), passable)
        .expect("open grid is solvable");

    assert_eq!(cost, 10);
    assert_eq!(path.len(), 11);
    assert_eq!(path[0], Point::new(0, 0));
    assert_eq!(path[10], Point::new(5, 5));
    assert_walkable(&grid, &path);
}

#[test]
fn path_to_self_is_the_single_tile() {
    let grid = grid_from(MAZE);
    let (path, cost) = grid
        .path(Point::new(1, 1), Point::new(1, 1), passable)
        .expect("trivial path");
    assert_eq!(cost, 0);
    assert_eq!(path, vec![Point::new(1, 1)]);
}

#[test]
fn walled_off_goal_is_unreachable() {
    let grid = grid_from(&[
        "#########",
        "#..#....#",
        "#..#....#",
        "####....#",
        "#.......#",
        "#.......#",
        "#.......#",
        "#.......#",
        "#########",
    ]);
    assert!(grid
        .path(Point::new(1, 1), Point::new(7, 7), passable)
        .is_none());
}

#[test]
fn path_repeats_cleanly_through_the_pool() {
    let grid = grid_from(MAZE);
    for _ in 0..3 {
        let (path, cost) = grid
            .path(Point::new(1, 1), Point::new(7, 7), passable)
            .expect("maze is solvable");
        assert_eq!((path.len(), cost), (13, 12));
    }
}

#[test]
fn costs_steer_the_route() {
    // A cheap southern corridor versus an expensive direct row.
    let grid: Grid = Grid::new(9, 3);
    for x in 0..9 {
        grid.write_at(x, 0, 8); // cost 4 tiles
    }
    let weighted = |v: Value| match v {
        8 => 4,
        _ => 1,
    };
    let (path, cost) = grid
        .path(Point::new(0, 0), Point::new(8, 0), weighted)
        .expect("reachable");

    // Dropping a row, crossing on cheap tiles and climbing back beats
    // walking the expensive row: 1 + 8 + 4 = 13 vs 8 * 4 = 32.
    assert_eq!(cost, 13);
    assert_walkable(&grid, &path);
    assert!(path.iter().any(|p| p.y == 1));
}

#[test]
fn around_reaches_the_open_disc() {
    let grid = grid_from(MAZE);
    for _ in 0..3 {
        let mut seen = Vec::new();
        grid.around(Point::new(2, 2), 3, passable, |c| {
            seen.push(c.point().to_string());
        });
        seen.sort();

        let mut expect: Vec<String> = [
            "2,2", "2,1", "2,3", "1,2", "3,1", "1,1", "1,3", "3,3", "4,3", "3,4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        expect.sort();
        assert_eq!(seen, expect);
    }
}

#[test]
fn around_outside_the_grid_visits_nothing() {
    let grid = grid_from(MAZE);
    grid.around(Point::new(20, 20), 3, passable, |_| {
        panic!("visited a tile outside the grid");
    });
}

#[test]
fn around_always_reports_the_origin_first() {
    let grid = grid_from(MAZE);
    let mut first = None;
    grid.around(Point::new(2, 2), 0, passable, |c| {
        first.get_or_insert(c.point());
    });
    assert_eq!(first, Some(Point::new(2, 2)));
}
