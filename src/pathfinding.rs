//! Grid A* over a boolean walkability grid (`grid[y][x]`, `true` = walkable).
//!
//! Eight-directional with diagonal steps costing √2. A diagonal step is only
//! allowed when both orthogonal neighbours are open, so paths never cut
//! corners. The heuristic is Manhattan distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f32::consts::SQRT_2;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PathResult {
    /// Start to goal, both inclusive.
    pub path: Vec<GridPoint>,
    pub cost: f32,
}

const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug)]
struct OpenEntry {
    f_cost: f32,
    seq: u64,
    index: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f, earlier insertions first on ties.
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(a: GridPoint, b: GridPoint) -> f32 {
    ((a.x - b.x).abs() + (a.y - b.y).abs()) as f32
}

pub fn is_walkable(grid: &[Vec<bool>], x: i32, y: i32) -> bool {
    if x < 0 || y < 0 {
        return false;
    }
    grid.get(y as usize)
        .and_then(|row| row.get(x as usize))
        .copied()
        .unwrap_or(false)
}

/// Returns `None` when either endpoint is outside the grid, blocked, or the
/// goal cannot be reached.
pub fn find_path(grid: &[Vec<bool>], start: GridPoint, goal: GridPoint) -> Option<PathResult> {
    let height = grid.len();
    let width = grid.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return None;
    }
    if !is_walkable(grid, start.x, start.y) || !is_walkable(grid, goal.x, goal.y) {
        return None;
    }

    let index_of = |p: GridPoint| p.y as usize * width + p.x as usize;
    let point_of = |index: usize| GridPoint::new((index % width) as i32, (index / width) as i32);

    let cells = width * height;
    let mut g_scores = vec![f32::INFINITY; cells];
    let mut came_from: Vec<Option<usize>> = vec![None; cells];
    let mut closed = vec![false; cells];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    let start_index = index_of(start);
    let goal_index = index_of(goal);
    g_scores[start_index] = 0.0;
    open.push(OpenEntry {
        f_cost: heuristic(start, goal),
        seq,
        index: start_index,
    });

    while let Some(entry) = open.pop() {
        let current_index = entry.index;
        if closed[current_index] {
            continue;
        }
        if current_index == goal_index {
            return Some(PathResult {
                path: reconstruct_path(&came_from, current_index, point_of),
                cost: g_scores[current_index],
            });
        }
        closed[current_index] = true;

        let current = point_of(current_index);
        let current_g = g_scores[current_index];
        for (dx, dy) in DIRECTIONS {
            let nx = current.x + dx;
            let ny = current.y + dy;
            if !is_walkable(grid, nx, ny) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && (!is_walkable(grid, current.x, current.y + dy)
                    || !is_walkable(grid, current.x + dx, current.y))
            {
                continue;
            }

            let neighbor = GridPoint::new(nx, ny);
            let neighbor_index = index_of(neighbor);
            if closed[neighbor_index] {
                continue;
            }

            let tentative_g = current_g + if diagonal { SQRT_2 } else { 1.0 };
            if tentative_g < g_scores[neighbor_index] {
                g_scores[neighbor_index] = tentative_g;
                came_from[neighbor_index] = Some(current_index);
                seq += 1;
                open.push(OpenEntry {
                    f_cost: tentative_g + heuristic(neighbor, goal),
                    seq,
                    index: neighbor_index,
                });
            }
        }
    }

    None
}

fn reconstruct_path(
    came_from: &[Option<usize>],
    mut current: usize,
    point_of: impl Fn(usize) -> GridPoint,
) -> Vec<GridPoint> {
    let mut path = vec![point_of(current)];
    while let Some(prev) = came_from[current] {
        path.push(point_of(prev));
        current = prev;
    }
    path.reverse();
    path
}
