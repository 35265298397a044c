//! Cell selection for points and bounding boxes.
//!
//! [`generate_geo_cells`] lists the cells a point is indexed under, and
//! [`GeocellManager::best_bbox_search_cells`] picks the cheapest set of
//! same-resolution cells that together cover a bounding box.

use crate::compute::geocell::{
    GRID_SIZE, MAX_GEOCELL_RESOLUTION, compute, interpolate, interpolation_count,
};
use crate::compute::validation::validate_bounding_box;
use crate::config::SearchConfig;
use crate::error::Result;
use geo::Point;
use geocell_types::BoundingBox;

/// Scores a candidate cell set for a bounding-box search. Lower is cheaper.
///
/// Closures `Fn(num_cells, resolution) -> f64` implement this trait.
pub trait CostFunction {
    fn cost(&self, num_cells: usize, resolution: usize) -> f64;
}

impl<F> CostFunction for F
where
    F: Fn(usize, usize) -> f64,
{
    fn cost(&self, num_cells: usize, resolution: usize) -> f64 {
        self(num_cells, resolution)
    }
}

/// Free while the set fits in one 4x4 grid, prohibitive beyond that.
///
/// Because ties go to the finer resolution, this selects the finest
/// resolution covering the box with at most 16 cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCostFunction;

impl CostFunction for DefaultCostFunction {
    fn cost(&self, num_cells: usize, _resolution: usize) -> f64 {
        if num_cells > GRID_SIZE * GRID_SIZE {
            f64::MAX
        } else {
            0.0
        }
    }
}

/// The cells a point is indexed under: its containing cell at every
/// resolution from 1 to [`MAX_GEOCELL_RESOLUTION`], coarsest first.
pub fn generate_geo_cells(point: &Point) -> Result<Vec<String>> {
    let finest = compute(point, MAX_GEOCELL_RESOLUTION)?;
    Ok((1..=MAX_GEOCELL_RESOLUTION)
        .map(|resolution| finest[..resolution].to_string())
        .collect())
}

/// Bounding-box cell selection with the default configuration.
pub fn best_bbox_search_cells(bbox: &BoundingBox, cost_fn: &dyn CostFunction) -> Result<Vec<String>> {
    GeocellManager::default().best_bbox_search_cells(bbox, cost_fn)
}

/// Selects geocell sets for bounding-box searches.
#[derive(Debug, Clone, Default)]
pub struct GeocellManager {
    config: SearchConfig,
}

impl GeocellManager {
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Find the cheapest set of same-resolution cells covering `bbox`.
    ///
    /// Resolutions are scanned from the deepest one at which both corners
    /// still share a cell towards [`MAX_GEOCELL_RESOLUTION`]. Resolutions
    /// needing more than `max_feasible_bbox_cells` cells are skipped. The scan
    /// stops at the first cost increase unless `scan_all_resolutions` is set.
    /// Boxes crossing the antimeridian are split in two and the two cell sets
    /// concatenated, so their cells may differ in resolution.
    ///
    /// Returns an empty list when no resolution is feasible.
    ///
    /// # Examples
    ///
    /// ```
    /// use geocell::manager::{DefaultCostFunction, GeocellManager};
    /// use geocell::BoundingBox;
    ///
    /// let manager = GeocellManager::default();
    /// let bbox = BoundingBox::new(1.0, 1.0, 0.5, 0.5);
    /// let cells = manager.best_bbox_search_cells(&bbox, &DefaultCostFunction).unwrap();
    /// assert!(!cells.is_empty() && cells.len() <= 16);
    /// ```
    pub fn best_bbox_search_cells(
        &self,
        bbox: &BoundingBox,
        cost_fn: &dyn CostFunction,
    ) -> Result<Vec<String>> {
        validate_bounding_box(bbox)?;

        if let Some((west_part, east_part)) = bbox.split_antimeridian() {
            let mut cells = self.best_bbox_search_cells(&west_part, cost_fn)?;
            cells.extend(self.best_bbox_search_cells(&east_part, cost_fn)?);
            return Ok(cells);
        }

        let cell_ne = compute(&bbox.north_east(), MAX_GEOCELL_RESOLUTION)?;
        let cell_sw = compute(&bbox.south_west(), MAX_GEOCELL_RESOLUTION)?;

        let common_prefix = cell_ne
            .bytes()
            .zip(cell_sw.bytes())
            .take_while(|(ne, sw)| ne == sw)
            .count();
        // Resolution 0 is the whole world as a single unnamed cell.
        let min_resolution = common_prefix.max(1);

        let mut min_cost = f64::MAX;
        let mut min_cost_cells: Vec<String> = Vec::new();

        for resolution in min_resolution..=MAX_GEOCELL_RESOLUTION {
            let cur_ne = &cell_ne[..resolution];
            let cur_sw = &cell_sw[..resolution];

            let num_cells = interpolation_count(cur_ne, cur_sw)?;
            if num_cells > self.config.max_feasible_bbox_cells {
                continue;
            }

            let mut cells = interpolate(cur_ne, cur_sw)?;
            cells.sort();

            let mut cost = cost_fn.cost(cells.len(), resolution);
            if cost.is_nan() {
                log::warn!(
                    "Cost function returned NaN for {} cells at resolution {}",
                    cells.len(),
                    resolution
                );
                cost = f64::MAX;
            }

            if cost <= min_cost {
                min_cost = cost;
                min_cost_cells = cells;
            } else {
                if min_cost_cells.is_empty() {
                    min_cost_cells = cells;
                }
                if !self.config.scan_all_resolutions {
                    break;
                }
            }
        }

        log::debug!(
            "Selected {} cells for box ({}, {}) ({}, {})",
            min_cost_cells.len(),
            bbox.south,
            bbox.west,
            bbox.north,
            bbox.east
        );
        Ok(min_cost_cells)
    }
}
