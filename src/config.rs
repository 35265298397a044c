//! Search and indexing configuration.
//!
//! `SearchConfig` is serializable so it can be embedded in a service's own
//! configuration file and loaded from JSON (or TOML with the `toml` feature).

use crate::compute::geocell::MAX_GEOCELL_RESOLUTION;
use crate::error::{GeocellError, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs shared by the index writer, the bounding-box cell selector and
/// the proximity search engine.
///
/// # Example
///
/// ```rust
/// use geocell::SearchConfig;
///
/// let config = SearchConfig::from_json(r#"{ "fetch_size": 250 }"#).unwrap();
/// assert_eq!(config.fetch_size, 250);
/// assert_eq!(config.index_resolution, 9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Deepest resolution written by the index writer. Fresh proximity
    /// searches start from the cell of this resolution containing the point.
    #[serde(default = "SearchConfig::default_index_resolution")]
    pub index_resolution: usize,

    /// Number of columns read from the store per page.
    #[serde(default = "SearchConfig::default_fetch_size")]
    pub fetch_size: usize,

    /// Resolutions needing more cells than this are skipped by the
    /// bounding-box cell selector.
    #[serde(default = "SearchConfig::default_max_feasible_bbox_cells")]
    pub max_feasible_bbox_cells: usize,

    /// Keep scanning finer resolutions after the cost starts rising.
    #[serde(default)]
    pub scan_all_resolutions: bool,
}

impl SearchConfig {
    const fn default_index_resolution() -> usize {
        9
    }

    const fn default_fetch_size() -> usize {
        1000
    }

    const fn default_max_feasible_bbox_cells() -> usize {
        300
    }

    pub fn with_index_resolution(mut self, resolution: usize) -> Self {
        self.index_resolution = resolution;
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn with_max_feasible_bbox_cells(mut self, max_cells: usize) -> Self {
        self.max_feasible_bbox_cells = max_cells;
        self
    }

    pub fn with_scan_all_resolutions(mut self, scan_all: bool) -> Self {
        self.scan_all_resolutions = scan_all;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_GEOCELL_RESOLUTION).contains(&self.index_resolution) {
            return Err(GeocellError::Config(format!(
                "index_resolution must be between 1 and {}, got {}",
                MAX_GEOCELL_RESOLUTION, self.index_resolution
            )));
        }

        if self.fetch_size == 0 {
            return Err(GeocellError::Config(
                "fetch_size must be greater than zero".to_string(),
            ));
        }

        if self.max_feasible_bbox_cells == 0 {
            return Err(GeocellError::Config(
                "max_feasible_bbox_cells must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: SearchConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_resolution: Self::default_index_resolution(),
            fetch_size: Self::default_fetch_size(),
            max_feasible_bbox_cells: Self::default_max_feasible_bbox_cells(),
            scan_all_resolutions: false,
        }
    }
}
