//! Located entity references and their distance ordering.
//!
//! An [`EntityLocationRef`] is what the geo index stores for every indexed
//! entity: its identity, a time-ordered marker for the indexed version, and
//! the indexed coordinates. It is serialized into an [`IndexColumn`] whose
//! name sorts by entity id, which is what store paging keys on.

use crate::compute::distance::distance;
use crate::compute::validation::{validate_entity_type, validate_geographic_point};
use crate::error::{GeocellError, Result};
use crate::storage::IndexColumn;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

const UUID_LEN: usize = 16;
const TYPE_LEN_PREFIX: usize = 2;
const VALUE_LEN: usize = 16;

/// An entity indexed at a point.
///
/// Equality and hashing use only the entity id and type. The time marker and
/// the computed distance never take part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityLocationRef {
    entity_id: Uuid,
    entity_type: String,
    time_marker: Uuid,
    latitude: f64,
    longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distance: Option<f64>,
}

impl EntityLocationRef {
    pub fn new(
        entity_id: Uuid,
        entity_type: impl Into<String>,
        time_marker: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            entity_id,
            entity_type: entity_type.into(),
            time_marker,
            latitude,
            longitude,
            distance: None,
        }
    }

    /// Like [`EntityLocationRef::new`], stamped with a fresh time-ordered marker.
    pub fn now(entity_id: Uuid, entity_type: impl Into<String>, point: &Point) -> Self {
        Self::new(entity_id, entity_type, Uuid::now_v7(), point.y(), point.x())
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn time_marker(&self) -> Uuid {
        self.time_marker
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The indexed position as a `geo::Point` (x = longitude, y = latitude).
    pub fn point(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }

    /// Distance to the last point passed to [`EntityLocationRef::calc_distance`].
    pub fn distance(&self) -> Option<f64> {
        self.distance
    }

    /// Compute, remember and return the distance in meters to `point`.
    pub fn calc_distance(&mut self, point: &Point) -> f64 {
        let meters = distance(&self.point(), point);
        self.distance = Some(meters);
        meters
    }

    /// Order by distance, then by time marker. A missing distance sorts as
    /// infinitely far.
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        let d1 = self.distance.unwrap_or(f64::INFINITY);
        let d2 = other.distance.unwrap_or(f64::INFINITY);
        d1.total_cmp(&d2)
            .then_with(|| self.time_marker.as_u128().cmp(&other.time_marker.as_u128()))
    }

    /// Encode the column name: id, length-prefixed type, then time marker.
    ///
    /// Fails with `InvalidInput` when the type does not fit the u16 prefix.
    pub fn column_name(&self) -> Result<Bytes> {
        let type_len = validate_entity_type(&self.entity_type)?;
        let type_bytes = self.entity_type.as_bytes();
        let mut buf = BytesMut::with_capacity(UUID_LEN * 2 + TYPE_LEN_PREFIX + type_bytes.len());
        buf.put_u128(self.entity_id.as_u128());
        buf.put_u16(type_len);
        buf.put_slice(type_bytes);
        buf.put_u128(self.time_marker.as_u128());
        Ok(buf.freeze())
    }

    /// Encode the column value: latitude then longitude.
    pub fn column_value(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(VALUE_LEN);
        buf.put_f64(self.latitude);
        buf.put_f64(self.longitude);
        buf.freeze()
    }

    pub fn to_column(&self) -> Result<IndexColumn> {
        Ok(IndexColumn::new(self.column_name()?, self.column_value()))
    }

    /// Decode an index column written by [`EntityLocationRef::to_column`].
    pub fn from_column(column: &IndexColumn) -> Result<Self> {
        let mut name = column.name.clone();
        if name.remaining() < UUID_LEN + TYPE_LEN_PREFIX {
            return Err(GeocellError::InvalidFormat(format!(
                "Column name too short: {} bytes",
                name.remaining()
            )));
        }

        let entity_id = Uuid::from_u128(name.get_u128());
        let type_len = name.get_u16() as usize;
        if name.remaining() != type_len + UUID_LEN {
            return Err(GeocellError::InvalidFormat(format!(
                "Column name for {} has {} trailing bytes, expected {}",
                entity_id,
                name.remaining(),
                type_len + UUID_LEN
            )));
        }

        let entity_type = std::str::from_utf8(&name[..type_len])
            .map_err(|e| GeocellError::InvalidFormat(format!("Entity type of {}: {}", entity_id, e)))?
            .to_string();
        name.advance(type_len);
        let time_marker = Uuid::from_u128(name.get_u128());

        let mut value = column.value.clone();
        if value.remaining() != VALUE_LEN {
            return Err(GeocellError::InvalidFormat(format!(
                "Column value for {} has {} bytes, expected {}",
                entity_id,
                value.remaining(),
                VALUE_LEN
            )));
        }
        let latitude = value.get_f64();
        let longitude = value.get_f64();

        validate_geographic_point(&Point::new(longitude, latitude))
            .map_err(|e| GeocellError::InvalidFormat(format!("Location of {}: {}", entity_id, e)))?;

        Ok(Self::new(entity_id, entity_type, time_marker, latitude, longitude))
    }
}

impl PartialEq for EntityLocationRef {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id && self.entity_type == other.entity_type
    }
}

impl Eq for EntityLocationRef {}

impl Hash for EntityLocationRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_id.hash(state);
        self.entity_type.hash(state);
    }
}

/// Ordering used for proximity results: nearest first, ties broken by time
/// marker, and `None` after every present value.
pub fn compare_by_distance(a: Option<&EntityLocationRef>, b: Option<&EntityLocationRef>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp_by_distance(b),
    }
}

/// Encode an entity id as a column-name lower bound: every column of that
/// entity, and of every later entity, sorts at or after it.
pub fn entity_start_marker(entity_id: Uuid) -> Bytes {
    Bytes::copy_from_slice(entity_id.as_bytes())
}
