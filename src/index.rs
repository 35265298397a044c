//! Writing entity locations into the geocell index.
//!
//! A location is indexed under its containing cell at every resolution from 1
//! up to the configured index resolution, one column per cell, so a search
//! at any of those resolutions finds it.

use crate::compute::validation::{validate_entity_type, validate_geographic_point};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::location::EntityLocationRef;
use crate::manager::generate_geo_cells;
use crate::storage::{GeoIndexMutator, IndexBucketLocator, IndexOp, IndexScope};
use uuid::Uuid;

/// Maintains geocell index rows for located entities.
#[derive(Debug, Clone)]
pub struct GeoIndexWriter<L> {
    locator: L,
    app_id: Uuid,
    config: SearchConfig,
}

impl<L: IndexBucketLocator> GeoIndexWriter<L> {
    pub fn new(locator: L, app_id: Uuid, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            locator,
            app_id,
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The cells `location` is indexed under, coarsest first.
    ///
    /// Rejects locations whose columns could not be written or read back.
    pub fn index_cells(&self, location: &EntityLocationRef) -> Result<Vec<String>> {
        let point = location.point();
        validate_geographic_point(&point)?;
        validate_entity_type(location.entity_type())?;

        let mut cells = generate_geo_cells(&point)?;
        cells.truncate(self.config.index_resolution);
        Ok(cells)
    }

    /// Write `location` into every index row it belongs to. Returns the cells
    /// written.
    pub fn store_location<M: GeoIndexMutator + ?Sized>(
        &self,
        mutator: &mut M,
        scope: &IndexScope,
        property: &str,
        location: &EntityLocationRef,
    ) -> Result<Vec<String>> {
        let cells = self.index_cells(location)?;
        let mut ops = Vec::with_capacity(cells.len());
        self.push_inserts(&mut ops, scope, property, location, &cells)?;
        mutator.apply(&ops)?;

        log::info!(
            "Indexed {} {} at ({}, {}) in cells {}",
            location.entity_type(),
            location.entity_id(),
            location.latitude(),
            location.longitude(),
            cells.join(", ")
        );
        Ok(cells)
    }

    /// Delete the columns written by [`GeoIndexWriter::store_location`].
    pub fn remove_location<M: GeoIndexMutator + ?Sized>(
        &self,
        mutator: &mut M,
        scope: &IndexScope,
        property: &str,
        location: &EntityLocationRef,
    ) -> Result<()> {
        let cells = self.index_cells(location)?;
        let mut ops = Vec::with_capacity(cells.len());
        self.push_deletes(&mut ops, scope, property, location, &cells)?;
        mutator.apply(&ops)?;

        log::info!(
            "Removed {} {} from cells {}",
            location.entity_type(),
            location.entity_id(),
            cells.join(", ")
        );
        Ok(())
    }

    /// Replace a previously indexed location in a single batch.
    pub fn update_location<M: GeoIndexMutator + ?Sized>(
        &self,
        mutator: &mut M,
        scope: &IndexScope,
        property: &str,
        old: Option<&EntityLocationRef>,
        new: &EntityLocationRef,
    ) -> Result<Vec<String>> {
        let new_cells = self.index_cells(new)?;
        let mut ops = Vec::with_capacity(new_cells.len() * 2);

        if let Some(old) = old {
            let old_cells = self.index_cells(old)?;
            self.push_deletes(&mut ops, scope, property, old, &old_cells)?;
        }
        self.push_inserts(&mut ops, scope, property, new, &new_cells)?;
        mutator.apply(&ops)?;

        log::info!(
            "Moved {} {} to ({}, {}) in cells {}",
            new.entity_type(),
            new.entity_id(),
            new.latitude(),
            new.longitude(),
            new_cells.join(", ")
        );
        Ok(new_cells)
    }

    fn push_inserts(
        &self,
        ops: &mut Vec<IndexOp>,
        scope: &IndexScope,
        property: &str,
        location: &EntityLocationRef,
        cells: &[String],
    ) -> Result<()> {
        let column = location.to_column()?;
        for cell in cells {
            let bucket = self.locator.bucket(self.app_id, location.entity_id(), cell);
            ops.push(IndexOp::Insert {
                key: scope.row_key(property, cell, &bucket),
                column: column.clone(),
            });
        }
        Ok(())
    }

    fn push_deletes(
        &self,
        ops: &mut Vec<IndexOp>,
        scope: &IndexScope,
        property: &str,
        location: &EntityLocationRef,
        cells: &[String],
    ) -> Result<()> {
        let name = location.column_name()?;
        for cell in cells {
            let bucket = self.locator.bucket(self.app_id, location.entity_id(), cell);
            ops.push(IndexOp::Delete {
                key: scope.row_key(property, cell, &bucket),
                name: name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::geocell::compute;
    use crate::storage::{GeoIndexStore, MemoryGeoIndex, SimpleBucketLocator};
    use geo::Point;

    fn writer(buckets: usize) -> GeoIndexWriter<SimpleBucketLocator> {
        GeoIndexWriter::new(
            SimpleBucketLocator::new(buckets).unwrap(),
            Uuid::nil(),
            SearchConfig::default(),
        )
        .unwrap()
    }

    fn scope() -> IndexScope {
        IndexScope::new(Uuid::from_u128(7), "pins")
    }

    #[test]
    fn test_store_location_writes_every_resolution() {
        let writer = writer(1);
        let mut index = MemoryGeoIndex::new();
        let point = Point::new(-122.404744, 37.774277);
        let location = EntityLocationRef::now(Uuid::new_v4(), "pin", &point);

        let cells = writer
            .store_location(&mut index, &scope(), "location", &location)
            .unwrap();

        assert_eq!(cells.len(), 9);
        assert_eq!(cells[8], compute(&point, 9).unwrap());
        assert_eq!(index.row_count(), 9);
        assert_eq!(index.column_count(), 9);

        let key = scope().row_key("location", &cells[4], "0");
        let columns = index.query(&[key], None, 10).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(EntityLocationRef::from_column(&columns[0]).unwrap(), location);
    }

    #[test]
    fn test_store_location_uses_entity_bucket() {
        let writer = writer(3);
        let mut index = MemoryGeoIndex::new();
        let location = EntityLocationRef::now(Uuid::from_u128(5), "pin", &Point::new(10.0, 10.0));

        let cells = writer
            .store_location(&mut index, &scope(), "location", &location)
            .unwrap();

        let key = scope().row_key("location", &cells[0], "2");
        assert_eq!(index.row(&key).len(), 1);
        let wrong = scope().row_key("location", &cells[0], "0");
        assert!(index.row(&wrong).is_empty());
    }

    #[test]
    fn test_remove_location() {
        let writer = writer(2);
        let mut index = MemoryGeoIndex::new();
        let location = EntityLocationRef::now(Uuid::new_v4(), "pin", &Point::new(10.0, 10.0));
        let keep = EntityLocationRef::now(Uuid::new_v4(), "pin", &Point::new(10.0, 10.0));

        writer.store_location(&mut index, &scope(), "location", &location).unwrap();
        writer.store_location(&mut index, &scope(), "location", &keep).unwrap();
        writer.remove_location(&mut index, &scope(), "location", &location).unwrap();

        assert_eq!(index.column_count(), 9);
        let bucket = writer.locator.bucket(Uuid::nil(), keep.entity_id(), "c");
        let remaining = index.row(&scope().row_key("location", "c", &bucket));
        assert_eq!(remaining.len(), 1);
        assert_eq!(EntityLocationRef::from_column(&remaining[0]).unwrap(), keep);
    }

    #[test]
    fn test_update_location_moves_entry() {
        let writer = writer(1);
        let mut index = MemoryGeoIndex::new();
        let id = Uuid::new_v4();
        let before = EntityLocationRef::now(id, "pin", &Point::new(10.0, 10.0));
        let after = EntityLocationRef::now(id, "pin", &Point::new(-10.0, -10.0));

        writer.update_location(&mut index, &scope(), "location", None, &before).unwrap();
        let cells = writer
            .update_location(&mut index, &scope(), "location", Some(&before), &after)
            .unwrap();

        assert_eq!(index.column_count(), 9);
        let key = scope().row_key("location", &cells[8], "0");
        let stored = EntityLocationRef::from_column(&index.row(&key)[0]).unwrap();
        assert_eq!(stored.time_marker(), after.time_marker());
    }

    #[test]
    fn test_index_resolution_is_configurable() {
        let writer = GeoIndexWriter::new(
            SimpleBucketLocator::default(),
            Uuid::nil(),
            SearchConfig::default().with_index_resolution(4),
        )
        .unwrap();
        let location = EntityLocationRef::now(Uuid::new_v4(), "pin", &Point::new(1.0, 1.0));
        assert_eq!(writer.index_cells(&location).unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_location_is_rejected() {
        let writer = writer(1);
        let mut index = MemoryGeoIndex::new();
        let location = EntityLocationRef::new(Uuid::new_v4(), "pin", Uuid::now_v7(), 95.0, 0.0);

        assert!(writer.store_location(&mut index, &scope(), "location", &location).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_oversized_entity_type_is_not_written() {
        let writer = writer(1);
        let mut index = MemoryGeoIndex::new();
        let neighbour = EntityLocationRef::now(Uuid::new_v4(), "pin", &Point::new(3.0, 4.0));
        let oversized = EntityLocationRef::now(Uuid::new_v4(), "t".repeat(70_000), &Point::new(3.0, 4.0));

        writer.store_location(&mut index, &scope(), "location", &neighbour).unwrap();
        let err = writer
            .store_location(&mut index, &scope(), "location", &oversized)
            .unwrap_err();
        assert!(matches!(err, crate::error::GeocellError::InvalidInput(_)));
        assert!(
            writer
                .update_location(&mut index, &scope(), "location", Some(&oversized), &neighbour)
                .is_err()
        );

        assert_eq!(index.column_count(), 9);
        let key = scope().row_key("location", &compute(&Point::new(3.0, 4.0), 9).unwrap(), "0");
        let columns = index.query(&[key], None, 10).unwrap();
        assert_eq!(EntityLocationRef::from_column(&columns[0]).unwrap(), neighbour);
    }
}
