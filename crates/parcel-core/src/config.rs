use serde::{Deserialize, Serialize};

use crate::error::{Result, ZonalError};

/// Inward buffer applied to every polygon before extraction, in CRS units.
pub const DEFAULT_SHRINK_DISTANCE: f64 = 5.0;
/// Percentile rank reduced per band.
pub const DEFAULT_PERCENTILE: f64 = 75.0;
/// Characters dropped from the front of each date label (`2019-` in `2019-05-03`).
pub const DEFAULT_DATE_PREFIX_WIDTH: usize = 5;

/// Tunables of one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Positive distance the polygons are shrunk by.
    pub shrink_distance: f64,
    /// Percentile rank in [0, 100].
    pub percentile: f64,
    pub date_prefix_width: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            shrink_distance: DEFAULT_SHRINK_DISTANCE,
            percentile: DEFAULT_PERCENTILE,
            date_prefix_width: DEFAULT_DATE_PREFIX_WIDTH,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.shrink_distance.is_finite() || self.shrink_distance < 0.0 {
            return Err(ZonalError::Config {
                reason: format!(
                    "shrink_distance must be a finite, non-negative distance (got {})",
                    self.shrink_distance
                ),
            });
        }
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(ZonalError::Config {
                reason: format!("percentile must lie in [0, 100] (got {})", self.percentile),
            });
        }
        Ok(())
    }
}
