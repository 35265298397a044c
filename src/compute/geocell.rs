//! Geocell encoding.
//!
//! A geocell is a string over the alphabet `0123456789abcdef` naming a
//! rectangular region of the `[-90, 90] x [-180, 180]` latitude/longitude
//! plane. The plane is divided into a 4x4 grid, each character picks one
//! sub-rectangle, and the next character divides that sub-rectangle again:
//!
//! ```text
//!              +---+---+---+---+ (90, 180)
//!              | a | b | e | f |
//!              +---+---+---+---+
//!              | 8 | 9 | c | d |
//!              +---+---+---+---+
//!              | 2 | 3 | 6 | 7 |
//!              +---+---+---+---+
//!              | 0 | 1 | 4 | 5 |
//!  (-90,-180)  +---+---+---+---+
//! ```
//!
//! A cell's resolution is its length and any prefix of a cell is one of its
//! ancestors. The empty string denotes the whole plane.

use crate::error::{GeocellError, Result};
use geo::Point;
use geocell_types::bbox::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};
use geocell_types::{BoundingBox, Direction};
use smallvec::SmallVec;

/// Width and height of the subdivision grid. The character mapping below only
/// works for a grid size of 4.
pub const GRID_SIZE: usize = 4;

/// The sixteen cell symbols, indexed by their interleaved grid position.
pub const ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// The maximum practical geocell resolution.
pub const MAX_GEOCELL_RESOLUTION: usize = 13;

/// Grid interpolations larger than this are reported as this value.
pub const INTERPOLATION_COUNT_CAP: usize = i32::MAX as usize;

type Coords = SmallVec<[(usize, usize); MAX_GEOCELL_RESOLUTION]>;

fn alphabet_index(symbol: u8) -> Option<usize> {
    match symbol {
        b'0'..=b'9' => Some((symbol - b'0') as usize),
        b'a'..=b'f' => Some((symbol - b'a') as usize + 10),
        _ => None,
    }
}

/// Returns the `(x, y)` grid position of a cell symbol.
pub fn subdiv_xy(symbol: char) -> Option<(usize, usize)> {
    let index = u8::try_from(symbol).ok().and_then(alphabet_index)?;
    Some((
        ((index & 4) >> 1) | (index & 1),
        ((index & 8) >> 2) | ((index & 2) >> 1),
    ))
}

/// Returns the cell symbol at grid position `(x, y)`. Both must be below [`GRID_SIZE`].
pub fn subdiv_char(x: usize, y: usize) -> char {
    debug_assert!(x < GRID_SIZE && y < GRID_SIZE);
    let index = ((y & 2) << 2) | ((x & 2) << 1) | ((y & 1) << 1) | (x & 1);
    ALPHABET[index] as char
}

/// Decode a cell into per-symbol grid positions, rejecting bad symbols and
/// cells deeper than [`MAX_GEOCELL_RESOLUTION`]. The empty cell is accepted.
fn cell_coords(cell: &str) -> Result<Coords> {
    if cell.len() > MAX_GEOCELL_RESOLUTION {
        return Err(GeocellError::InvalidGeocell(format!(
            "'{}' is longer than the maximum resolution {}",
            cell, MAX_GEOCELL_RESOLUTION
        )));
    }

    cell.chars()
        .map(|symbol| {
            subdiv_xy(symbol).ok_or_else(|| {
                GeocellError::InvalidGeocell(format!(
                    "'{}' contains '{}', which is not a geocell symbol",
                    cell, symbol
                ))
            })
        })
        .collect()
}

fn encode_coords(coords: &[(usize, usize)]) -> String {
    coords.iter().map(|&(x, y)| subdiv_char(x, y)).collect()
}

/// Whether the string names a geocell: non-empty, within the maximum
/// resolution, and made only of alphabet symbols.
pub fn is_valid_cell(cell: &str) -> bool {
    !cell.is_empty()
        && cell.len() <= MAX_GEOCELL_RESOLUTION
        && cell.bytes().all(|symbol| alphabet_index(symbol).is_some())
}

/// Compute the cell of the given resolution containing a point.
///
/// # Errors
///
/// Returns an error if the point is outside the latitude/longitude plane or
/// the resolution exceeds [`MAX_GEOCELL_RESOLUTION`].
///
/// # Examples
///
/// ```
/// use geocell::compute::geocell::compute;
/// use geo::Point;
///
/// let cell = compute(&Point::new(0.0, 0.0), 3).unwrap();
/// assert_eq!(cell, "c00");
/// ```
pub fn compute(point: &Point, resolution: usize) -> Result<String> {
    crate::compute::validation::validate_geographic_point(point)?;
    crate::compute::validation::validate_resolution(resolution)?;

    let grid = GRID_SIZE as f64;
    let mut north = MAX_LATITUDE;
    let mut south = MIN_LATITUDE;
    let mut east = MAX_LONGITUDE;
    let mut west = MIN_LONGITUDE;

    let mut cell = String::with_capacity(resolution);
    while cell.len() < resolution {
        let lon_span = (east - west) / grid;
        let lat_span = (north - south) / grid;

        // Clamp so points on the north/east edge land in the last row/column.
        let x = ((grid * (point.x() - west) / (east - west)) as usize).min(GRID_SIZE - 1);
        let y = ((grid * (point.y() - south) / (north - south)) as usize).min(GRID_SIZE - 1);
        cell.push(subdiv_char(x, y));

        south += lat_span * y as f64;
        north = south + lat_span;
        west += lon_span * x as f64;
        east = west + lon_span;
    }

    Ok(cell)
}

/// Compute the rectangle covered by a cell. The empty cell covers the world.
pub fn compute_box(cell: &str) -> Result<BoundingBox> {
    let coords = cell_coords(cell)?;
    let grid = GRID_SIZE as f64;

    let mut north = MAX_LATITUDE;
    let mut south = MIN_LATITUDE;
    let mut east = MAX_LONGITUDE;
    let mut west = MIN_LONGITUDE;

    // Same narrowing steps as `compute`, so a cell's box always contains the
    // points that encode to it.
    for (x, y) in coords {
        let lon_span = (east - west) / grid;
        let lat_span = (north - south) / grid;

        south += lat_span * y as f64;
        north = south + lat_span;
        west += lon_span * x as f64;
        east = west + lon_span;
    }

    Ok(BoundingBox::new(north, east, south, west))
}

/// Whether the cell contains the point.
pub fn contains_point(cell: &str, point: &Point) -> Result<bool> {
    cell_coords(cell)?;
    Ok(compute(point, cell.len())? == cell)
}

/// The immediate parent of a cell, or `None` for the empty cell.
pub fn parent(cell: &str) -> Option<&str> {
    if cell.is_empty() {
        return None;
    }
    Some(&cell[..cell.len() - 1])
}

/// The sixteen children of a cell, in alphabet order.
pub fn children(cell: &str) -> Result<Vec<String>> {
    if cell.len() >= MAX_GEOCELL_RESOLUTION {
        return Err(GeocellError::InvalidGeocell(format!(
            "'{}' is already at the maximum resolution",
            cell
        )));
    }
    cell_coords(cell)?;

    Ok(ALPHABET
        .iter()
        .map(|&symbol| {
            let mut child = String::with_capacity(cell.len() + 1);
            child.push_str(cell);
            child.push(symbol as char);
            child
        })
        .collect())
}

/// The sixteen resolution-1 cells, which together cover the world.
pub fn top_level_cells() -> Vec<String> {
    ALPHABET.iter().map(|&symbol| (symbol as char).to_string()).collect()
}

/// Whether two cells lie in the same row (`column_test == false`) or the same
/// column (`column_test == true`), compared over their common depth.
pub fn collinear(cell1: &str, cell2: &str, column_test: bool) -> Result<bool> {
    let coords1 = cell_coords(cell1)?;
    let coords2 = cell_coords(cell2)?;

    Ok(coords1.iter().zip(coords2.iter()).all(|(&(x1, y1), &(x2, y2))| {
        if column_test { x1 == x2 } else { y1 == y2 }
    }))
}

/// Compute the neighbouring cell in the given direction.
///
/// Steps are carried from the last symbol towards the first, the way a
/// fixed-width counter carries, with independent carries for the x and y
/// axes. Stepping east or west off the edge of the plane wraps around;
/// stepping north or south past a pole yields `None`.
///
/// # Examples
///
/// ```
/// use geocell::compute::geocell::adjacent;
/// use geocell::Direction;
///
/// assert_eq!(adjacent("c00", Direction::East).unwrap().as_deref(), Some("c01"));
/// assert_eq!(adjacent("f", Direction::North).unwrap(), None);
/// ```
pub fn adjacent(cell: &str, direction: Direction) -> Result<Option<String>> {
    let mut coords = cell_coords(cell)?;
    let (mut dx, mut dy) = direction.vector();
    let last = GRID_SIZE - 1;

    for (x, y) in coords.iter_mut().rev() {
        if dx == 0 && dy == 0 {
            break;
        }

        match dx {
            -1 if *x == 0 => *x = last,
            -1 => {
                *x -= 1;
                dx = 0;
            }
            1 if *x == last => *x = 0,
            1 => {
                *x += 1;
                dx = 0;
            }
            _ => {}
        }

        match dy {
            1 if *y == last => *y = 0,
            1 => {
                *y += 1;
                dy = 0;
            }
            -1 if *y == 0 => *y = last,
            -1 => {
                *y -= 1;
                dy = 0;
            }
            _ => {}
        }
    }

    // An unresolved vertical carry means the step crossed a pole.
    if dy != 0 {
        return Ok(None);
    }

    Ok(Some(encode_coords(&coords)))
}

/// All eight neighbours of a cell, in [`Direction::ALL`] order.
pub fn all_adjacents(cell: &str) -> Result<[Option<String>; 8]> {
    let mut result: [Option<String>; 8] = Default::default();
    for (slot, direction) in result.iter_mut().zip(Direction::ALL) {
        *slot = adjacent(cell, direction)?;
    }
    Ok(result)
}

/// Generate every cell of the rectangular grid spanned by a north-east and a
/// south-west corner cell, row by row from the south-west.
///
/// # Errors
///
/// The two cells must share a resolution and `cell_ne` must lie north-east of
/// (or on) `cell_sw`.
pub fn interpolate(cell_ne: &str, cell_sw: &str) -> Result<Vec<String>> {
    check_corners(cell_ne, cell_sw)?;

    let mut first_row = vec![cell_sw.to_string()];
    loop {
        let last = &first_row[first_row.len() - 1];
        if collinear(last, cell_ne, true)? {
            break;
        }
        match adjacent(last, Direction::East)? {
            Some(next) => first_row.push(next),
            None => break,
        }
    }

    let mut rows = vec![first_row];
    loop {
        let row = &rows[rows.len() - 1];
        if row[row.len() - 1] == cell_ne {
            break;
        }

        let next_row = row
            .iter()
            .map(|cell| adjacent(cell, Direction::North))
            .collect::<Result<Option<Vec<String>>>>()?;
        match next_row {
            Some(next_row) => rows.push(next_row),
            None => break,
        }
    }

    Ok(rows.into_iter().flatten().collect())
}

/// Number of cells [`interpolate`] would produce, computed from the corner
/// boxes without building the grid.
pub fn interpolation_count(cell_ne: &str, cell_sw: &str) -> Result<usize> {
    check_corners(cell_ne, cell_sw)?;

    let bbox_ne = compute_box(cell_ne)?;
    let bbox_sw = compute_box(cell_sw)?;

    let cell_lat_span = bbox_sw.north - bbox_sw.south;
    let cell_lon_span = bbox_sw.east - bbox_sw.west;

    // Spans are exact multiples of the cell size; round away float noise.
    let num_cols = ((bbox_ne.east - bbox_sw.west) / cell_lon_span).round();
    let num_rows = ((bbox_ne.north - bbox_sw.south) / cell_lat_span).round();

    let total = num_cols * num_rows;
    if total >= INTERPOLATION_COUNT_CAP as f64 {
        return Ok(INTERPOLATION_COUNT_CAP);
    }
    Ok(total as usize)
}

fn check_corners(cell_ne: &str, cell_sw: &str) -> Result<()> {
    if cell_ne.len() != cell_sw.len() {
        return Err(GeocellError::InvalidInput(format!(
            "corner cells '{}' and '{}' have different resolutions",
            cell_ne, cell_sw
        )));
    }

    let bbox_ne = compute_box(cell_ne)?;
    let bbox_sw = compute_box(cell_sw)?;
    if bbox_ne.east < bbox_sw.east || bbox_ne.north < bbox_sw.north {
        return Err(GeocellError::InvalidInput(format!(
            "cell '{}' is not north-east of cell '{}'",
            cell_ne, cell_sw
        )));
    }

    Ok(())
}
