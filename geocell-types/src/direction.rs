use serde::{Deserialize, Serialize};

/// One of the eight compass neighbours of a grid cell.
///
/// Each direction maps to an `(dx, dy)` step where `-1` is west/south and `1`
/// is east/north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
}

impl Direction {
    /// All directions, clockwise starting from the north-west.
    pub const ALL: [Direction; 8] = [
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
    ];

    /// The `(dx, dy)` grid step for this direction.
    pub const fn vector(self) -> (i8, i8) {
        match self {
            Direction::NorthWest => (-1, 1),
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
        }
    }

    /// Look up the direction for a grid step. `(0, 0)` has no direction.
    pub const fn from_vector(dx: i8, dy: i8) -> Option<Direction> {
        match (dx, dy) {
            (-1, 1) => Some(Direction::NorthWest),
            (0, 1) => Some(Direction::North),
            (1, 1) => Some(Direction::NorthEast),
            (1, 0) => Some(Direction::East),
            (1, -1) => Some(Direction::SouthEast),
            (0, -1) => Some(Direction::South),
            (-1, -1) => Some(Direction::SouthWest),
            (-1, 0) => Some(Direction::West),
            _ => None,
        }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::NorthWest => Direction::SouthEast,
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
        }
    }

    /// True for pure north/south steps.
    pub const fn is_vertical(self) -> bool {
        self.vector().0 == 0
    }

    /// True for pure east/west steps.
    pub const fn is_horizontal(self) -> bool {
        self.vector().1 == 0
    }
}
