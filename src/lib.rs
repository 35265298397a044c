//! Geocell spatial indexing and proximity search.
//!
//! Points are encoded into hierarchical geocells, indexed under every cell
//! containing them, and found again by an expanding nearest-neighbour search
//! that pages through a wide-row index store.
//!
//! ```rust
//! use geocell::prelude::*;
//! use uuid::Uuid;
//!
//! let index = MemoryGeoIndex::new();
//! let shared = parking_lot::RwLock::new(index);
//! let scope = IndexScope::new(Uuid::nil(), "restaurants");
//! let config = SearchConfig::default();
//!
//! let writer = GeoIndexWriter::new(SimpleBucketLocator::default(), Uuid::nil(), config.clone())?;
//! let cafe = EntityLocationRef::now(Uuid::new_v4(), "cafe", &Point::new(-122.4194, 37.7749));
//! writer.store_location(&mut &shared, &scope, "location", &cafe)?;
//!
//! let searcher = GeoIndexSearcher::new(&shared, SimpleBucketLocator::default(), Uuid::nil(), scope, config)?;
//! let results = searcher.proximity_search(
//!     None,
//!     &[],
//!     &Point::new(-122.4195, 37.7750),
//!     "location",
//!     0.0,
//!     1_000.0,
//!     10,
//! )?;
//! assert_eq!(results.entity_locations, vec![cafe]);
//! # Ok::<(), geocell::GeocellError>(())
//! ```

pub mod compute;
pub mod config;
pub mod error;
pub mod index;
pub mod location;
pub mod manager;
pub mod search;
pub mod storage;

pub use compute::distance::{EARTH_RADIUS_METERS, distance, point_to_cell_distance};
pub use compute::geocell::{MAX_GEOCELL_RESOLUTION, adjacent, compute, compute_box};
pub use config::SearchConfig;
pub use error::{GeocellError, Result};
pub use index::GeoIndexWriter;
pub use location::{EntityLocationRef, compare_by_distance};
pub use manager::{
    CostFunction, DefaultCostFunction, GeocellManager, best_bbox_search_cells, generate_geo_cells,
};
pub use search::{CellFrontier, DistanceSortedList, FrontierPhase, GeoIndexSearcher, SearchResults};
pub use storage::{
    GeoIndexMutator, GeoIndexStore, IndexBucketLocator, IndexColumn, IndexOp, IndexRowKey,
    IndexScope, MemoryGeoIndex, SimpleBucketLocator,
};

pub use geo::Point;
pub use geocell_types::{BoundingBox, Direction};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeocellError, Result, SearchConfig};

    pub use geo::Point;

    pub use crate::{BoundingBox, Direction};

    pub use crate::{DefaultCostFunction, GeocellManager, best_bbox_search_cells, generate_geo_cells};

    pub use crate::{EntityLocationRef, GeoIndexSearcher, GeoIndexWriter, SearchResults};

    pub use crate::{
        GeoIndexMutator, GeoIndexStore, IndexScope, MemoryGeoIndex, SimpleBucketLocator,
    };
}
