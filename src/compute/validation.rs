//! Validation for geographic coordinates, geocells and search parameters.

use crate::compute::geocell::{MAX_GEOCELL_RESOLUTION, is_valid_cell};
use crate::error::{GeocellError, Result};
use geo::Point;
use geocell_types::BoundingBox;
use geocell_types::bbox::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};

/// Checks a point lies on the latitude/longitude plane: both coordinates
/// finite, longitude in [-180, 180] and latitude in [-90, 90].
///
/// # Examples
///
/// ```
/// use geocell::compute::validation::validate_geographic_point;
/// use geo::Point;
///
/// assert!(validate_geographic_point(&Point::new(-74.0060, 40.7128)).is_ok());
/// assert!(validate_geographic_point(&Point::new(200.0, 40.0)).is_err());
/// ```
pub fn validate_geographic_point(point: &Point) -> Result<()> {
    check_axis("Longitude", point.x(), MIN_LONGITUDE, MAX_LONGITUDE)?;
    check_axis("Latitude", point.y(), MIN_LATITUDE, MAX_LATITUDE)
}

fn check_axis(axis: &str, value: f64, min: f64, max: f64) -> Result<()> {
    // NaN fails the range test as well.
    if value.is_finite() && (min..=max).contains(&value) {
        return Ok(());
    }
    Err(GeocellError::InvalidInput(format!(
        "{} {} is outside the plane [{}, {}]",
        axis, value, min, max
    )))
}

/// Checks an entity type fits the u16 length prefix of an index column name.
pub fn validate_entity_type(entity_type: &str) -> Result<u16> {
    u16::try_from(entity_type.len()).map_err(|_| {
        GeocellError::InvalidInput(format!(
            "Entity type is {} bytes long, at most {} fit in an index column",
            entity_type.len(),
            u16::MAX
        ))
    })
}

/// Validates multiple points, reporting the index of the first bad one.
pub fn validate_points(points: &[Point]) -> Result<()> {
    for (idx, point) in points.iter().enumerate() {
        validate_geographic_point(point)
            .map_err(|e| GeocellError::InvalidInput(format!("Point at index {}: {}", idx, e)))?;
    }
    Ok(())
}

/// Validates a geocell string.
pub fn validate_cell(cell: &str) -> Result<()> {
    if !is_valid_cell(cell) {
        return Err(GeocellError::InvalidGeocell(format!(
            "'{}' is not a geocell of resolution 1 to {}",
            cell, MAX_GEOCELL_RESOLUTION
        )));
    }
    Ok(())
}

/// Validates a cell resolution. Zero is allowed and denotes the whole world.
pub fn validate_resolution(resolution: usize) -> Result<()> {
    if resolution > MAX_GEOCELL_RESOLUTION {
        return Err(GeocellError::InvalidInput(format!(
            "Resolution must be at most {}, got: {}",
            MAX_GEOCELL_RESOLUTION, resolution
        )));
    }
    Ok(())
}

/// Validates the four edges of a bounding box. East may be less than west for
/// boxes crossing the antimeridian.
pub fn validate_bounding_box(bbox: &BoundingBox) -> Result<()> {
    validate_geographic_point(&bbox.north_east())
        .map_err(|e| GeocellError::InvalidInput(format!("North-east corner: {}", e)))?;
    validate_geographic_point(&bbox.south_west())
        .map_err(|e| GeocellError::InvalidInput(format!("South-west corner: {}", e)))?;
    Ok(())
}

/// Validates proximity search distance bounds. A `max_distance` of zero means
/// unbounded.
pub fn validate_distance_bounds(min_distance: f64, max_distance: f64) -> Result<()> {
    for (name, value) in [("min_distance", min_distance), ("max_distance", max_distance)] {
        if !value.is_finite() || value < 0.0 {
            return Err(GeocellError::InvalidInput(format!(
                "{} must be finite and non-negative, got: {}",
                name, value
            )));
        }
    }

    if max_distance > 0.0 && min_distance > max_distance {
        return Err(GeocellError::InvalidInput(format!(
            "min_distance {} exceeds max_distance {}",
            min_distance, max_distance
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_geographic_point() {
        let nyc = Point::new(-74.0060, 40.7128);
        assert!(validate_geographic_point(&nyc).is_ok());

        let tokyo = Point::new(139.6917, 35.6895);
        assert!(validate_geographic_point(&tokyo).is_ok());

        // Edge cases
        assert!(validate_geographic_point(&Point::new(180.0, 0.0)).is_ok());
        assert!(validate_geographic_point(&Point::new(-180.0, 0.0)).is_ok());
        assert!(validate_geographic_point(&Point::new(0.0, 90.0)).is_ok());
        assert!(validate_geographic_point(&Point::new(0.0, -90.0)).is_ok());
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(validate_geographic_point(&Point::new(180.1, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-200.0, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-74.0, 90.1)).is_err());
        assert!(validate_geographic_point(&Point::new(-74.0, -95.0)).is_err());
    }

    #[test]
    fn test_non_finite_coordinates() {
        assert!(validate_geographic_point(&Point::new(f64::NAN, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-74.0, f64::NAN)).is_err());
        assert!(validate_geographic_point(&Point::new(f64::INFINITY, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-74.0, f64::NEG_INFINITY)).is_err());
    }

    #[test]
    fn test_validate_multiple_points() {
        let valid_points = vec![Point::new(-74.0, 40.7), Point::new(-73.9, 40.8)];
        assert!(validate_points(&valid_points).is_ok());

        let invalid_points = vec![
            Point::new(-74.0, 40.7),
            Point::new(999.0, 40.0), // Invalid
        ];
        let err = validate_points(&invalid_points).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_validate_cell() {
        assert!(validate_cell("8e6d").is_ok());
        assert!(matches!(
            validate_cell(""),
            Err(GeocellError::InvalidGeocell(_))
        ));
        assert!(validate_cell("xyz").is_err());
        assert!(validate_cell("01234567890abc").is_err());
    }

    #[test]
    fn test_validate_resolution() {
        assert!(validate_resolution(0).is_ok());
        assert!(validate_resolution(MAX_GEOCELL_RESOLUTION).is_ok());
        assert!(validate_resolution(MAX_GEOCELL_RESOLUTION + 1).is_err());
    }

    #[test]
    fn test_validate_bounding_box() {
        assert!(validate_bounding_box(&BoundingBox::new(10.0, -170.0, -10.0, 170.0)).is_ok());
        assert!(validate_bounding_box(&BoundingBox::new(95.0, 10.0, 0.0, 0.0)).is_err());
        assert!(validate_bounding_box(&BoundingBox::new(10.0, 10.0, 0.0, f64::NAN)).is_err());
    }

    #[test]
    fn test_validate_distance_bounds() {
        assert!(validate_distance_bounds(0.0, 0.0).is_ok());
        assert!(validate_distance_bounds(100.0, 0.0).is_ok());
        assert!(validate_distance_bounds(10.0, 100.0).is_ok());
        assert!(validate_distance_bounds(-1.0, 100.0).is_err());
        assert!(validate_distance_bounds(0.0, f64::NAN).is_err());
        assert!(validate_distance_bounds(0.0, f64::INFINITY).is_err());
        assert!(validate_distance_bounds(200.0, 100.0).is_err());
    }

    #[test]
    fn test_point_error_names_axis() {
        let err = validate_geographic_point(&Point::new(10.0, -91.0)).unwrap_err();
        assert!(err.to_string().contains("Latitude -91"));
        let err = validate_geographic_point(&Point::new(f64::NAN, 0.0)).unwrap_err();
        assert!(err.to_string().contains("Longitude NaN"));
    }

    #[test]
    fn test_validate_entity_type() {
        assert_eq!(validate_entity_type("restaurant").unwrap(), 10);
        assert_eq!(validate_entity_type(&"x".repeat(65_535)).unwrap(), u16::MAX);
        assert!(matches!(
            validate_entity_type(&"x".repeat(65_536)),
            Err(GeocellError::InvalidInput(_))
        ));
    }
}
