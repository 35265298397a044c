//! # geocell-types
//!
//! Value types shared by the geocell encoder and the proximity search engine.
//!
//! - **Bounding boxes**: `BoundingBox`, a north/east/south/west rectangle that
//!   may cross the antimeridian
//! - **Directions**: `Direction`, the eight compass neighbours of a grid cell
//!
//! Points are plain `geo::Point<f64>` values with `x` holding the longitude and
//! `y` holding the latitude.
//!
//! ## Examples
//!
//! ```rust
//! use geocell_types::bbox::BoundingBox;
//! use geocell_types::direction::Direction;
//!
//! let bay_area = BoundingBox::new(38.0, -122.0, 37.0, -123.0);
//! assert!(!bay_area.crosses_antimeridian());
//! assert_eq!(Direction::North.opposite(), Direction::South);
//! ```

pub mod bbox;
pub mod direction;

pub use bbox::BoundingBox;
pub use direction::Direction;
