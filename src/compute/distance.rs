//! Great-circle distance between points and from points to geocells.

use crate::compute::geocell::compute_box;
use crate::error::{GeocellError, Result};
use geo::Point;
use geocell_types::Direction;
use smallvec::SmallVec;

/// Earth radius used for every distance, in meters. This is the equatorial
/// radius, kept so distances match existing stored values.
pub const EARTH_RADIUS_METERS: f64 = 6_378_135.0;

/// Distance in meters between two points, by the spherical law of cosines.
///
/// The cosine sum is clamped to `[-1, 1]` so rounding can never produce NaN.
///
/// # Examples
///
/// ```
/// use geocell::compute::distance::distance;
/// use geo::Point;
///
/// let meters = distance(&Point::new(0.0, 0.0), &Point::new(1.0, 0.0));
/// assert!((meters - 111_319.5).abs() < 1.0);
/// ```
pub fn distance(p1: &Point, p2: &Point) -> f64 {
    if p1 == p2 {
        return 0.0;
    }

    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let delta_lon = (p2.x() - p1.x()).to_radians();

    let cos_angle = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lon.cos();
    EARTH_RADIUS_METERS * cos_angle.clamp(-1.0, 1.0).acos()
}

/// Shortest distance in meters from a point to a cell's rectangle.
///
/// A point inside the cell reports its distance to the nearest edge, not zero.
pub fn point_to_cell_distance(cell: &str, point: &Point) -> Result<f64> {
    let bbox = compute_box(cell)?;
    let (lon, lat) = (point.x(), point.y());

    let between_we = bbox.west <= lon && lon <= bbox.east;
    let between_ns = bbox.south <= lat && lat <= bbox.north;

    let to = |lon: f64, lat: f64| distance(point, &Point::new(lon, lat));
    let ns_edges = || to(lon, bbox.south).min(to(lon, bbox.north));
    let we_edges = || to(bbox.east, lat).min(to(bbox.west, lat));

    let meters = match (between_we, between_ns) {
        (true, true) => ns_edges().min(we_edges()),
        (true, false) => ns_edges(),
        (false, true) => we_edges(),
        (false, false) => to(bbox.east, bbox.south)
            .min(to(bbox.east, bbox.north))
            .min(to(bbox.west, bbox.south))
            .min(to(bbox.west, bbox.north)),
    };

    Ok(meters)
}

/// Distance from the search point to one edge of a cell set's bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDistance {
    pub direction: Direction,
    pub distance: f64,
}

/// The four compass edges of the rectangle bounding `cells`, nearest first.
///
/// Edge distances are measured along the point's own meridian (north/south)
/// or parallel (east/west). Equal distances keep south, north, west, east order.
pub fn distance_sorted_edges<S: AsRef<str>>(
    cells: &[S],
    point: &Point,
) -> Result<SmallVec<[EdgeDistance; 4]>> {
    if cells.is_empty() {
        return Err(GeocellError::InvalidInput(
            "Cannot compute edges of an empty cell set".to_string(),
        ));
    }

    let mut north = f64::NEG_INFINITY;
    let mut east = f64::NEG_INFINITY;
    let mut south = f64::INFINITY;
    let mut west = f64::INFINITY;
    for cell in cells {
        let bbox = compute_box(cell.as_ref())?;
        north = north.max(bbox.north);
        east = east.max(bbox.east);
        south = south.min(bbox.south);
        west = west.min(bbox.west);
    }

    let (lon, lat) = (point.x(), point.y());
    let edge = |direction, edge_point: Point| EdgeDistance {
        direction,
        distance: distance(&edge_point, point),
    };

    let mut edges: SmallVec<[EdgeDistance; 4]> = SmallVec::new();
    edges.push(edge(Direction::South, Point::new(lon, south)));
    edges.push(edge(Direction::North, Point::new(lon, north)));
    edges.push(edge(Direction::West, Point::new(west, lat)));
    edges.push(edge(Direction::East, Point::new(east, lat)));
    edges.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    Ok(edges)
}
