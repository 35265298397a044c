//! Proximity search over the geocell index.
//!
//! The search starts from the cell containing the search point (or from the
//! cell set a previous call stopped at) and widens step by step:
//!
//! ```text
//!   Single --(adjacent toward nearest edge)--> Pair
//!   Pair   --(perpendicular adjacents)-------> Quad
//!   Quad   --(parents)-----------------------> Single | Pair | Quad
//!   any    --(round found nothing)-----------> parents
//!   parents of a resolution-1 cell ----------> ParentSweep (16 top-level cells)
//!   ParentSweep -----------------------------> Exhausted
//! ```
//!
//! Each step queries only cells not yet searched in this call, keeping at
//! most `max_results` candidates in a distance-sorted list. The search stops
//! once the nearest unexplored edge is beyond `max_distance`, once the list
//! is full and that edge is no nearer than its farthest entry, or after the
//! top-level sweep.

use crate::compute::distance::{EdgeDistance, distance_sorted_edges};
use crate::compute::geocell::{adjacent, compute, top_level_cells};
use crate::compute::validation::{
    validate_bounding_box, validate_cell, validate_distance_bounds, validate_geographic_point,
};
use crate::config::SearchConfig;
use crate::error::{GeocellError, Result};
use crate::location::EntityLocationRef;
use crate::manager::{CostFunction, GeocellManager};
use crate::storage::{GeoIndexStore, IndexBucketLocator, IndexRowKey, IndexScope};
use geo::Point;
use geocell_types::BoundingBox;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use uuid::Uuid;

/// Results of one proximity search call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Accepted locations, nearest first.
    pub entity_locations: Vec<EntityLocationRef>,
    /// The cell set the search stopped at. Pass it back with the last result
    /// as `min_match` to continue from where this call ended.
    pub last_searched_cells: Vec<String>,
}

/// Shape of the cell set a search is currently examining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierPhase {
    /// The containing cell alone.
    Single,
    /// The containing cell and one neighbour.
    Pair,
    /// A 2x2 block (or any other set that is widened by climbing).
    Quad,
    /// The sixteen top-level cells.
    ParentSweep,
    /// Nothing left to search.
    Exhausted,
}

/// The cell set of an expanding search and its widening rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFrontier {
    cells: Vec<String>,
    containing: String,
    phase: FrontierPhase,
}

impl CellFrontier {
    /// Start from a single containing cell.
    pub fn new(cell: impl Into<String>) -> Result<Self> {
        let cell = cell.into();
        validate_cell(&cell)?;
        Ok(Self {
            containing: cell.clone(),
            cells: vec![cell],
            phase: FrontierPhase::Single,
        })
    }

    /// Resume from a cell set returned by an earlier search. The first cell is
    /// taken as the containing cell.
    pub fn resume(cells: Vec<String>) -> Result<Self> {
        let Some(first) = cells.first() else {
            return Err(GeocellError::InvalidInput(
                "Cannot resume a search from an empty cell set".to_string(),
            ));
        };
        let resolution = first.len();

        let mut unique: Vec<String> = Vec::with_capacity(cells.len());
        for cell in cells {
            validate_cell(&cell)?;
            if cell.len() != resolution {
                return Err(GeocellError::InvalidInput(format!(
                    "Resume cells must share one resolution, got '{}' and '{}'",
                    unique.first().map_or("", String::as_str),
                    cell
                )));
            }
            if !unique.contains(&cell) {
                unique.push(cell);
            }
        }

        Ok(Self {
            containing: unique[0].clone(),
            phase: Self::phase_for(&unique),
            cells: unique,
        })
    }

    fn phase_for(cells: &[String]) -> FrontierPhase {
        match cells.len() {
            1 => FrontierPhase::Single,
            2 => FrontierPhase::Pair,
            16 if cells.iter().all(|cell| cell.len() == 1) => FrontierPhase::ParentSweep,
            _ => FrontierPhase::Quad,
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }

    /// The cell every cell of the set descends from or neighbours. Empty once
    /// the search has climbed past resolution 1.
    pub fn containing_cell(&self) -> &str {
        &self.containing
    }

    pub fn phase(&self) -> FrontierPhase {
        self.phase
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == FrontierPhase::Exhausted
    }

    /// Mark the search complete, keeping the current cells.
    pub fn finish(&mut self) {
        self.phase = FrontierPhase::Exhausted;
    }

    /// Widen the cell set after a round.
    ///
    /// `found_any` tells whether the round's query returned any column and
    /// `edges` are the current set's edges sorted by distance from `point`.
    pub fn advance(&mut self, found_any: bool, edges: &[EdgeDistance], point: &Point) -> Result<()> {
        match self.phase {
            FrontierPhase::Exhausted => {}
            FrontierPhase::ParentSweep => self.finish(),
            FrontierPhase::Quad => self.climb(),
            _ if !found_any => self.climb(),
            FrontierPhase::Single => self.expand_single(edges)?,
            FrontierPhase::Pair => self.expand_pair(edges, point)?,
        }
        Ok(())
    }

    fn expand_single(&mut self, edges: &[EdgeDistance]) -> Result<()> {
        for edge in edges {
            // None means the step would cross a pole.
            if let Some(neighbour) = adjacent(&self.cells[0], edge.direction)? {
                self.cells.push(neighbour);
                self.phase = FrontierPhase::Pair;
                return Ok(());
            }
        }
        self.climb();
        Ok(())
    }

    fn expand_pair(&mut self, edges: &[EdgeDistance], point: &Point) -> Result<()> {
        let nearest = distance_sorted_edges(std::slice::from_ref(&self.containing), point)?;
        let was_vertical = nearest
            .first()
            .is_some_and(|edge| edge.direction.is_vertical());

        let perpendicular = edges.iter().map(|edge| edge.direction).find(|direction| {
            if was_vertical {
                direction.is_horizontal()
            } else {
                direction.is_vertical()
            }
        });

        if let Some(direction) = perpendicular {
            for direction in [direction, direction.opposite()] {
                let neighbours = self
                    .cells
                    .iter()
                    .map(|cell| adjacent(cell, direction))
                    .collect::<Result<Option<Vec<String>>>>()?;
                if let Some(neighbours) = neighbours {
                    self.cells.extend(neighbours);
                    self.phase = FrontierPhase::Quad;
                    return Ok(());
                }
            }
        }

        self.climb();
        Ok(())
    }

    fn climb(&mut self) {
        self.containing.pop();
        if self.containing.is_empty() {
            self.cells = top_level_cells();
            self.phase = FrontierPhase::ParentSweep;
            return;
        }

        let mut parents: Vec<String> = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            let parent = &cell[..cell.len().saturating_sub(1)];
            if !parent.is_empty() && !parents.iter().any(|p| p == parent) {
                parents.push(parent.to_string());
            }
        }

        self.phase = Self::phase_for(&parents);
        self.cells = parents;
    }
}

/// Distance-ordered list holding at most `capacity` locations, one per entity.
#[derive(Debug, Clone)]
pub struct DistanceSortedList {
    items: Vec<EntityLocationRef>,
    capacity: usize,
}

impl DistanceSortedList {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Insert a location with a computed distance. Returns true if it was kept.
    ///
    /// An entity already in the list is replaced only by a newer time marker.
    /// Locations that would land past the capacity are dropped.
    pub fn insert(&mut self, candidate: EntityLocationRef) -> bool {
        let mut index = match self
            .items
            .binary_search_by(|probe| probe.cmp_by_distance(&candidate))
        {
            Ok(_) => return false,
            Err(index) => index,
        };

        if let Some(existing) = self.items.iter().position(|item| item == &candidate) {
            if self.items[existing].time_marker().as_u128() >= candidate.time_marker().as_u128() {
                return false;
            }
            self.items.remove(existing);
            if existing < index {
                index -= 1;
            }
        } else if index >= self.capacity {
            return false;
        }

        self.items.insert(index, candidate);
        self.items.truncate(self.capacity);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Distance of the last (farthest) entry.
    pub fn farthest_distance(&self) -> Option<f64> {
        self.items.last().and_then(EntityLocationRef::distance)
    }

    pub fn as_slice(&self) -> &[EntityLocationRef] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<EntityLocationRef> {
        self.items
    }
}

/// Acceptance window of one search call.
struct SearchBounds<'a> {
    point: &'a Point,
    min_distance: f64,
    max_distance: f64,
    min_match: Option<EntityLocationRef>,
}

impl SearchBounds<'_> {
    fn admits(&self, candidate: &EntityLocationRef) -> bool {
        let distance = candidate.distance().unwrap_or(f64::INFINITY);
        if distance < self.min_distance || (self.max_distance > 0.0 && distance > self.max_distance) {
            log::trace!("{} at {}m is out of range", candidate.entity_id(), distance);
            return false;
        }

        if let Some(min_match) = &self.min_match
            && candidate.cmp_by_distance(min_match) != Ordering::Greater
        {
            log::trace!("{} was returned by an earlier page", candidate.entity_id());
            return false;
        }

        true
    }
}

/// Runs proximity and bounding-box searches against a geocell index.
#[derive(Debug)]
pub struct GeoIndexSearcher<S, L> {
    store: S,
    locator: L,
    app_id: Uuid,
    scope: IndexScope,
    config: SearchConfig,
}

impl<S: GeoIndexStore, L: IndexBucketLocator> GeoIndexSearcher<S, L> {
    pub fn new(
        store: S,
        locator: L,
        app_id: Uuid,
        scope: IndexScope,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            locator,
            app_id,
            scope,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Find up to `max_results` indexed locations nearest to `search_point`.
    ///
    /// Results lie within `[min_distance, max_distance]` meters (a
    /// `max_distance` of zero means unbounded) and sort strictly after
    /// `min_match` when one is given. Pass an empty `resume_cells` to start
    /// fresh, or the previous call's `last_searched_cells` together with its
    /// last result as `min_match` to fetch the next page.
    ///
    /// Store errors are returned as they are, without retrying.
    #[allow(clippy::too_many_arguments)]
    pub fn proximity_search(
        &self,
        min_match: Option<&EntityLocationRef>,
        resume_cells: &[String],
        search_point: &Point,
        property: &str,
        min_distance: f64,
        max_distance: f64,
        max_results: usize,
    ) -> Result<SearchResults> {
        validate_geographic_point(search_point)?;
        validate_distance_bounds(min_distance, max_distance)?;

        let mut frontier = if resume_cells.is_empty() {
            CellFrontier::new(compute(search_point, self.config.index_resolution)?)?
        } else {
            CellFrontier::resume(resume_cells.to_vec())?
        };

        if max_results == 0 {
            return Ok(SearchResults {
                entity_locations: Vec::new(),
                last_searched_cells: frontier.into_cells(),
            });
        }

        let bounds = SearchBounds {
            point: search_point,
            min_distance,
            max_distance,
            min_match: min_match.map(|previous| {
                let mut previous = previous.clone();
                previous.calc_distance(search_point);
                previous
            }),
        };

        let mut results = DistanceSortedList::new(max_results);
        let mut searched: FxHashSet<String> = FxHashSet::default();
        let mut closest_unexplored = 0.0;

        while !frontier.is_exhausted() {
            if max_distance > 0.0 && closest_unexplored > max_distance {
                break;
            }

            let unsearched: Vec<String> = frontier
                .cells()
                .iter()
                .filter(|cell| !searched.contains(*cell))
                .cloned()
                .collect();

            let fetched = if unsearched.is_empty() {
                0
            } else {
                let fetched = self.fetch_cells(&unsearched, property, &bounds, &mut results)?;
                log::debug!("fetch complete for: {}", unsearched.join(", "));
                fetched
            };
            searched.extend(frontier.cells().iter().cloned());

            if frontier.phase() == FrontierPhase::ParentSweep {
                frontier.finish();
                break;
            }

            let edges = distance_sorted_edges(frontier.cells(), search_point)?;
            closest_unexplored = edges.first().map_or(0.0, |edge| edge.distance);

            // A full list is final once nothing outside the searched cells
            // can be nearer than its farthest entry.
            if let Some(farthest) = results.farthest_distance()
                && results.is_full()
                && closest_unexplored >= farthest
            {
                break;
            }

            frontier.advance(fetched > 0, &edges, search_point)?;

            log::debug!("{} results found.", results.len());
        }

        Ok(SearchResults {
            entity_locations: results.into_vec(),
            last_searched_cells: frontier.into_cells(),
        })
    }

    /// Every indexed location inside `bbox`, read from the cells the cost
    /// function selects. Cells finer than the index resolution are read
    /// through their indexed ancestor.
    pub fn bbox_search(
        &self,
        bbox: &BoundingBox,
        property: &str,
        cost_fn: &dyn CostFunction,
    ) -> Result<Vec<EntityLocationRef>> {
        validate_bounding_box(bbox)?;

        let manager = GeocellManager::new(self.config.clone())?;
        let mut cells: Vec<String> = Vec::new();
        for cell in manager.best_bbox_search_cells(bbox, cost_fn)? {
            let indexed = &cell[..cell.len().min(self.config.index_resolution)];
            if !cells.iter().any(|known| known == indexed) {
                cells.push(indexed.to_string());
            }
        }

        let keys = self.row_keys(property, &cells);
        let mut seen: FxHashSet<EntityLocationRef> = FxHashSet::default();
        let mut found = Vec::new();
        self.scan_pages(&keys, |location| {
            if bbox.contains_point(&location.point()) && seen.insert(location.clone()) {
                found.push(location);
            }
        })?;

        log::debug!("{} locations found in {} cells", found.len(), cells.len());
        Ok(found)
    }

    /// Query `cells` page by page, offering every decoded location to
    /// `results`. Returns the number of columns read.
    fn fetch_cells(
        &self,
        cells: &[String],
        property: &str,
        bounds: &SearchBounds<'_>,
        results: &mut DistanceSortedList,
    ) -> Result<usize> {
        let keys = self.row_keys(property, cells);
        self.scan_pages(&keys, |mut location| {
            location.calc_distance(bounds.point);
            if bounds.admits(&location) {
                results.insert(location);
            }
        })
    }

    fn scan_pages<F>(&self, keys: &[IndexRowKey], mut visit: F) -> Result<usize>
    where
        F: FnMut(EntityLocationRef),
    {
        let fetch_size = self.config.fetch_size;
        let mut start: Option<Uuid> = None;
        let mut fetched = 0;

        loop {
            let page = self.store.query(keys, start, fetch_size)?;
            fetched += page.len();

            let mut last_id = None;
            for column in &page {
                let location = EntityLocationRef::from_column(column)?;
                last_id = Some(location.entity_id());
                visit(location);
            }

            if page.len() < fetch_size {
                break;
            }
            let Some(last_id) = last_id else {
                break;
            };

            // The start bound is inclusive, so a page made entirely of one
            // entity's columns would repeat forever.
            start = match start {
                Some(previous) if previous == last_id => {
                    log::warn!(
                        "More than {} index columns for entity {}, skipping the rest",
                        fetch_size,
                        last_id
                    );
                    match last_id.as_u128().checked_add(1) {
                        Some(next) => Some(Uuid::from_u128(next)),
                        None => break,
                    }
                }
                _ => Some(last_id),
            };
        }

        Ok(fetched)
    }

    fn row_keys(&self, property: &str, cells: &[String]) -> Vec<IndexRowKey> {
        cells
            .iter()
            .flat_map(|cell| {
                self.locator
                    .buckets(self.app_id, cell)
                    .into_iter()
                    .map(move |bucket| self.scope.row_key(property, cell, &bucket))
            })
            .collect()
    }
}
