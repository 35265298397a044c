//! Storage abstraction for the geocell index.
//!
//! The index is a wide-row store: every row is named by an [`IndexRowKey`]
//! (one row per geocell and bucket) and holds columns sorted by name. The
//! search engine only ever needs a batched, paged range read over a set of
//! rows, which is the [`GeoIndexStore`] trait. Writes go through
//! [`GeoIndexMutator`] as batches of [`IndexOp`].

use crate::error::{GeocellError, Result};
use crate::location::entity_start_marker;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use uuid::Uuid;

/// Dictionary tag shared by every geocell index row.
pub const GEOCELL_DICTIONARY: &str = "geocell";

/// Name of one index row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexRowKey {
    pub owner: Uuid,
    pub collection: String,
    pub property: String,
    pub dictionary: String,
    pub cell: String,
    pub bucket: String,
}

/// The owner and collection whose entities an index covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexScope {
    pub owner: Uuid,
    pub collection: String,
}

impl IndexScope {
    pub fn new(owner: Uuid, collection: impl Into<String>) -> Self {
        Self {
            owner,
            collection: collection.into(),
        }
    }

    /// Row key for one cell and bucket of `property`.
    pub fn row_key(&self, property: &str, cell: &str, bucket: &str) -> IndexRowKey {
        IndexRowKey {
            owner: self.owner,
            collection: self.collection.clone(),
            property: property.to_string(),
            dictionary: GEOCELL_DICTIONARY.to_string(),
            cell: cell.to_string(),
            bucket: bucket.to_string(),
        }
    }
}

/// A raw column as stored in an index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: Bytes,
    pub value: Bytes,
}

impl IndexColumn {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Batched range reads over index rows.
pub trait GeoIndexStore: Send + Sync {
    /// Read the union of the columns of `keys`, ordered by column name with
    /// duplicates removed, starting at the first column of entity `start`
    /// (or any later entity), returning at most `limit` columns.
    fn query(&self, keys: &[IndexRowKey], start: Option<Uuid>, limit: usize) -> Result<Vec<IndexColumn>>;
}

/// Index write operation for batch processing
#[derive(Debug, Clone)]
pub enum IndexOp {
    /// Insert or overwrite a column
    Insert { key: IndexRowKey, column: IndexColumn },
    /// Delete a column by name
    Delete { key: IndexRowKey, name: Bytes },
}

/// Batched writes to index rows.
pub trait GeoIndexMutator {
    fn apply(&mut self, ops: &[IndexOp]) -> Result<()>;
}

/// Spreads each cell's index over one or more bucket rows.
pub trait IndexBucketLocator: Send + Sync {
    /// Every bucket a cell's entries may live in.
    fn buckets(&self, app_id: Uuid, cell: &str) -> Vec<String>;

    /// The bucket an entity's entry for `cell` is written to.
    fn bucket(&self, app_id: Uuid, entity_id: Uuid, cell: &str) -> String;
}

/// Buckets entities by their id modulo a fixed bucket count.
#[derive(Debug, Clone, Copy)]
pub struct SimpleBucketLocator {
    num_buckets: usize,
}

impl SimpleBucketLocator {
    pub fn new(num_buckets: usize) -> Result<Self> {
        if num_buckets == 0 {
            return Err(GeocellError::Config(
                "num_buckets must be greater than zero".to_string(),
            ));
        }
        Ok(Self { num_buckets })
    }

    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }
}

impl Default for SimpleBucketLocator {
    fn default() -> Self {
        Self { num_buckets: 1 }
    }
}

impl IndexBucketLocator for SimpleBucketLocator {
    fn buckets(&self, _app_id: Uuid, _cell: &str) -> Vec<String> {
        (0..self.num_buckets).map(|bucket| bucket.to_string()).collect()
    }

    fn bucket(&self, _app_id: Uuid, entity_id: Uuid, _cell: &str) -> String {
        (entity_id.as_u128() % self.num_buckets as u128).to_string()
    }
}

/// Index statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of non-empty rows
    pub row_count: usize,
    /// Number of columns across all rows
    pub column_count: usize,
    /// Column names and values in bytes (approximate)
    pub size_bytes: usize,
    /// Number of write operations applied
    pub operations_count: u64,
}

/// In-memory index using nested BTreeMaps
#[derive(Debug, Default)]
pub struct MemoryGeoIndex {
    rows: BTreeMap<IndexRowKey, BTreeMap<Bytes, Bytes>>,
    operations_count: u64,
}

impl MemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a column. Returns true if the column is new.
    pub fn insert(&mut self, key: IndexRowKey, column: IndexColumn) -> bool {
        self.operations_count += 1;
        self.rows
            .entry(key)
            .or_default()
            .insert(column.name, column.value)
            .is_none()
    }

    /// Delete a column. Empty rows are dropped. Returns true if it existed.
    pub fn delete(&mut self, key: &IndexRowKey, name: &[u8]) -> bool {
        self.operations_count += 1;
        let Some(row) = self.rows.get_mut(key) else {
            return false;
        };

        let removed = row.remove(name).is_some();
        if row.is_empty() {
            self.rows.remove(key);
        }
        removed
    }

    /// Columns of a single row, in name order.
    pub fn row(&self, key: &IndexRowKey) -> Vec<IndexColumn> {
        self.rows
            .get(key)
            .map(|row| {
                row.iter()
                    .map(|(name, value)| IndexColumn::new(name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            row_count: self.row_count(),
            column_count: self.column_count(),
            size_bytes: self
                .rows
                .values()
                .flat_map(|row| row.iter())
                .map(|(name, value)| name.len() + value.len())
                .sum(),
            operations_count: self.operations_count,
        }
    }
}

impl GeoIndexStore for MemoryGeoIndex {
    fn query(&self, keys: &[IndexRowKey], start: Option<Uuid>, limit: usize) -> Result<Vec<IndexColumn>> {
        let lower = match start {
            Some(entity_id) => Bound::Included(entity_start_marker(entity_id)),
            None => Bound::Unbounded,
        };

        let mut merged: BTreeMap<&Bytes, &Bytes> = BTreeMap::new();
        for key in keys {
            if let Some(row) = self.rows.get(key) {
                merged.extend(row.range((lower.clone(), Bound::Unbounded)).take(limit));
            }
        }

        Ok(merged
            .into_iter()
            .take(limit)
            .map(|(name, value)| IndexColumn::new(name.clone(), value.clone()))
            .collect())
    }
}

impl GeoIndexMutator for MemoryGeoIndex {
    fn apply(&mut self, ops: &[IndexOp]) -> Result<()> {
        for op in ops {
            match op {
                IndexOp::Insert { key, column } => {
                    self.insert(key.clone(), column.clone());
                }
                IndexOp::Delete { key, name } => {
                    self.delete(key, name);
                }
            }
        }
        Ok(())
    }
}

impl<S: GeoIndexStore + ?Sized> GeoIndexStore for &S {
    fn query(&self, keys: &[IndexRowKey], start: Option<Uuid>, limit: usize) -> Result<Vec<IndexColumn>> {
        (**self).query(keys, start, limit)
    }
}

impl<S: GeoIndexStore + ?Sized> GeoIndexStore for Arc<S> {
    fn query(&self, keys: &[IndexRowKey], start: Option<Uuid>, limit: usize) -> Result<Vec<IndexColumn>> {
        (**self).query(keys, start, limit)
    }
}

/// Shared index: searches take the read lock for each page.
impl<S: GeoIndexStore> GeoIndexStore for RwLock<S> {
    fn query(&self, keys: &[IndexRowKey], start: Option<Uuid>, limit: usize) -> Result<Vec<IndexColumn>> {
        self.read().query(keys, start, limit)
    }
}

impl<M: GeoIndexMutator + ?Sized> GeoIndexMutator for &mut M {
    fn apply(&mut self, ops: &[IndexOp]) -> Result<()> {
        (**self).apply(ops)
    }
}

/// Shared index: a batch is applied under one write lock.
impl<M: GeoIndexMutator> GeoIndexMutator for &RwLock<M> {
    fn apply(&mut self, ops: &[IndexOp]) -> Result<()> {
        self.write().apply(ops)
    }
}

impl<M: GeoIndexMutator> GeoIndexMutator for Arc<RwLock<M>> {
    fn apply(&mut self, ops: &[IndexOp]) -> Result<()> {
        self.write().apply(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> IndexScope {
        IndexScope::new(Uuid::from_u128(42), "restaurants")
    }

    fn column(id: u128, tag: &'static [u8]) -> IndexColumn {
        let mut name = Uuid::from_u128(id).as_bytes().to_vec();
        name.extend_from_slice(tag);
        IndexColumn::new(name, Bytes::from_static(b"value"))
    }

    #[test]
    fn test_row_key() {
        let key = scope().row_key("location", "8e6", "0");
        assert_eq!(key.owner, Uuid::from_u128(42));
        assert_eq!(key.collection, "restaurants");
        assert_eq!(key.dictionary, GEOCELL_DICTIONARY);
        assert_eq!(key.cell, "8e6");
        assert_ne!(key, scope().row_key("location", "8e6", "1"));
    }

    #[test]
    fn test_simple_bucket_locator() {
        let locator = SimpleBucketLocator::new(4).unwrap();
        let app = Uuid::nil();

        assert_eq!(locator.buckets(app, "8e"), vec!["0", "1", "2", "3"]);
        assert_eq!(locator.bucket(app, Uuid::from_u128(9), "8e"), "1");
        assert_eq!(locator.bucket(app, Uuid::from_u128(9), "8e6"), "1");

        assert!(SimpleBucketLocator::new(0).is_err());
        assert_eq!(SimpleBucketLocator::default().buckets(app, "0"), vec!["0"]);
    }

    #[test]
    fn test_memory_index_basic_ops() {
        let mut index = MemoryGeoIndex::new();
        let key = scope().row_key("location", "8e", "0");

        assert!(index.insert(key.clone(), column(1, b"a")));
        assert!(!index.insert(key.clone(), column(1, b"a")));
        assert!(index.insert(key.clone(), column(2, b"a")));
        assert_eq!(index.row(&key).len(), 2);
        assert_eq!(index.row_count(), 1);
        assert_eq!(index.column_count(), 2);

        assert!(index.delete(&key, &column(1, b"a").name));
        assert!(!index.delete(&key, &column(1, b"a").name));
        assert!(index.delete(&key, &column(2, b"a").name));
        assert!(index.is_empty());
    }

    #[test]
    fn test_query_merges_rows_in_name_order() {
        let mut index = MemoryGeoIndex::new();
        let cell_a = scope().row_key("location", "8e", "0");
        let cell_b = scope().row_key("location", "8f", "0");
        let other = scope().row_key("other", "8e", "0");

        index.insert(cell_a.clone(), column(3, b"x"));
        index.insert(cell_a.clone(), column(1, b"x"));
        index.insert(cell_b.clone(), column(2, b"x"));
        index.insert(cell_b.clone(), column(1, b"x"));
        index.insert(other, column(0, b"x"));

        let columns = index.query(&[cell_a, cell_b], None, 10).unwrap();
        let names: Vec<Bytes> = columns.into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![column(1, b"x").name, column(2, b"x").name, column(3, b"x").name]
        );
    }

    #[test]
    fn test_query_pages_by_entity_id() {
        let mut index = MemoryGeoIndex::new();
        let key = scope().row_key("location", "8e", "0");
        for id in 1..=10 {
            index.insert(key.clone(), column(id, b"x"));
        }

        let first = index.query(std::slice::from_ref(&key), None, 4).unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first[0].name, column(1, b"x").name);

        // Start is inclusive of the given entity.
        let second = index.query(std::slice::from_ref(&key), Some(Uuid::from_u128(4)), 4).unwrap();
        assert_eq!(second[0].name, column(4, b"x").name);
        assert_eq!(second[3].name, column(7, b"x").name);

        let tail = index.query(&[key], Some(Uuid::from_u128(9)), 4).unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[test]
    fn test_apply_batch_and_stats() {
        let mut index = MemoryGeoIndex::new();
        let key = scope().row_key("location", "8e", "0");

        let ops = vec![
            IndexOp::Insert {
                key: key.clone(),
                column: column(1, b"x"),
            },
            IndexOp::Insert {
                key: key.clone(),
                column: column(2, b"x"),
            },
            IndexOp::Delete {
                key: key.clone(),
                name: column(1, b"x").name,
            },
        ];
        index.apply(&ops).unwrap();

        let stats = index.stats();
        assert_eq!(stats.row_count, 1);
        assert_eq!(stats.column_count, 1);
        assert_eq!(stats.operations_count, 3);
        assert_eq!(stats.size_bytes, 17 + 5);
    }

    #[test]
    fn test_shared_index_through_lock() {
        let shared = Arc::new(RwLock::new(MemoryGeoIndex::new()));
        let key = scope().row_key("location", "8e", "0");

        let mut writer = Arc::clone(&shared);
        writer
            .apply(&[IndexOp::Insert {
                key: key.clone(),
                column: column(1, b"x"),
            }])
            .unwrap();

        let reader: &dyn GeoIndexStore = &shared;
        assert_eq!(reader.query(&[key], None, 10).unwrap().len(), 1);
    }
}
