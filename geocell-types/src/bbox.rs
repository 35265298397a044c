use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Westernmost longitude of the grid.
pub const MIN_LONGITUDE: f64 = -180.0;
/// Easternmost longitude of the grid.
pub const MAX_LONGITUDE: f64 = 180.0;
/// Southernmost latitude of the grid.
pub const MIN_LATITUDE: f64 = -90.0;
/// Northernmost latitude of the grid.
pub const MAX_LATITUDE: f64 = 90.0;

/// A latitude/longitude rectangle described by its four edges, in degrees.
///
/// `north >= south` always holds; the constructor swaps the two when they are
/// given the wrong way round. East and west are never swapped: `east < west`
/// describes a box that crosses the antimeridian.
///
/// # Examples
///
/// ```
/// use geocell_types::bbox::BoundingBox;
///
/// let pacific = BoundingBox::new(10.0, -170.0, -10.0, 170.0);
/// assert!(pacific.crosses_antimeridian());
///
/// let (west_half, east_half) = pacific.split_antimeridian().unwrap();
/// assert_eq!(west_half.west, -180.0);
/// assert_eq!(east_half.east, 180.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Create a bounding box from its edges, given in north, east, south, west order.
    pub fn new(north: f64, east: f64, south: f64, west: f64) -> Self {
        let (north, south) = if south > north {
            (south, north)
        } else {
            (north, south)
        };

        Self {
            north,
            east,
            south,
            west,
        }
    }

    /// The whole latitude/longitude plane.
    pub fn world() -> Self {
        Self::new(MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE)
    }

    /// Build a bounding box from two opposite corners.
    pub fn from_corners(north_east: Point, south_west: Point) -> Self {
        Self::new(
            north_east.y(),
            north_east.x(),
            south_west.y(),
            south_west.x(),
        )
    }

    /// The north-east corner as a `geo::Point` (x = longitude, y = latitude).
    pub fn north_east(&self) -> Point {
        Point::new(self.east, self.north)
    }

    /// The south-west corner as a `geo::Point`.
    pub fn south_west(&self) -> Point {
        Point::new(self.west, self.south)
    }

    /// Whether the box wraps across the 180th meridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.east < self.west
    }

    /// Height of the box in degrees of latitude.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Width of the box in degrees of longitude, accounting for antimeridian wrap.
    pub fn lon_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            (MAX_LONGITUDE - self.west) + (self.east - MIN_LONGITUDE)
        } else {
            self.east - self.west
        }
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> Point {
        let lat = (self.north + self.south) / 2.0;
        let mut lon = self.west + self.lon_span() / 2.0;
        if lon > MAX_LONGITUDE {
            lon -= 360.0;
        }
        Point::new(lon, lat)
    }

    /// Check if a point lies inside the box, edges included.
    pub fn contains_point(&self, point: &Point) -> bool {
        let (lon, lat) = (point.x(), point.y());
        if lat < self.south || lat > self.north {
            return false;
        }

        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    /// Split an antimeridian-crossing box into its western and eastern parts.
    ///
    /// The first box runs from -180 to `east`, the second from `west` to 180.
    /// Returns `None` when the box does not cross the antimeridian.
    pub fn split_antimeridian(&self) -> Option<(BoundingBox, BoundingBox)> {
        if !self.crosses_antimeridian() {
            return None;
        }

        Some((
            BoundingBox::new(self.north, self.east, self.south, MIN_LONGITUDE),
            BoundingBox::new(self.north, MAX_LONGITUDE, self.south, self.west),
        ))
    }

    /// Convert to a `geo::Rect`. Antimeridian-crossing boxes have no `Rect` form.
    pub fn to_rect(&self) -> Option<Rect> {
        if self.crosses_antimeridian() {
            return None;
        }

        Some(Rect::new(
            geo::coord! { x: self.west, y: self.south },
            geo::coord! { x: self.east, y: self.north },
        ))
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        Self::new(rect.max().y, rect.max().x, rect.min().y, rect.min().x)
    }
}
