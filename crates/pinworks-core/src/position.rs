//! Integer grid positions, footprints and greedy four-directional stepping.
//!
//! There is no pathfinding: a mover takes one step per tick along the axis
//! with the larger remaining distance, preferring the horizontal axis on ties.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell on the 2D grid. `y` grows downwards (screen convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

/// Cardinal step directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit offset `(dx, dy)` for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl GridPosition {
    pub const ORIGIN: GridPosition = GridPosition { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position. Wide enough for any two cells.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u64 {
        u64::from(self.x.abs_diff(other.x)) + u64::from(self.y.abs_diff(other.y))
    }

    /// The neighbouring cell in the given direction. Clamps at the edge of
    /// the grid.
    pub fn moved(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Direction of the next greedy step toward `target`, or `None` when
    /// already there.
    pub fn direction_towards(&self, target: GridPosition) -> Option<Direction> {
        let dx = i64::from(target.x) - i64::from(self.x);
        let dy = i64::from(target.y) - i64::from(self.y);
        if dx == 0 && dy == 0 {
            return None;
        }
        let direction = if dx.unsigned_abs() >= dy.unsigned_abs() {
            if dx > 0 { Direction::Right } else { Direction::Left }
        } else if dy > 0 {
            Direction::Down
        } else {
            Direction::Up
        };
        Some(direction)
    }

    /// Take exactly one greedy step toward `target`. Returns `self` unchanged
    /// when already at the target.
    pub fn step_towards(self, target: GridPosition) -> Self {
        match self.direction_towards(target) {
            Some(direction) => self.moved(direction),
            None => self,
        }
    }
}

/// Width/height of something placed on the grid. Origin is the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 1x1 footprint.
    pub fn single() -> Self {
        Self::new(1, 1)
    }

    /// Whether `point` falls inside this footprint placed at `origin`.
    pub fn contains(&self, origin: GridPosition, point: GridPosition) -> bool {
        let dx = i64::from(point.x) - i64::from(origin.x);
        let dy = i64::from(point.y) - i64::from(origin.y);
        dx >= 0 && dy >= 0 && dx < i64::from(self.width) && dy < i64::from(self.height)
    }

    /// Iterate over all cells covered by this footprint at `origin`.
    pub fn tiles(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let w = i64::from(self.width);
        let h = i64::from(self.height);
        (0..h).flat_map(move |dy| {
            (0..w).filter_map(move |dx| {
                let x = i32::try_from(i64::from(origin.x) + dx).ok()?;
                let y = i32::try_from(i64::from(origin.y) + dy).ok()?;
                Some(GridPosition::new(x, y))
            })
        })
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::single()
    }
}
