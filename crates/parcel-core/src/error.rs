//! Error types for parcel-core.

use std::fmt;
use std::path::PathBuf;

use crate::raster::Window;

/// Error type for every fallible operation in the extraction pipeline.
///
/// Variants fall into the categories the pipeline cares about: I/O and
/// decoding failures of the sources, per-record geometry defects, alignment
/// errors between raster, vector and date list, and configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ZonalError {
    /// Filesystem failure on a source or the destination.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The raster could not be decoded or has an unsupported layout.
    #[error("raster {}: {reason}", path.display())]
    Raster { path: PathBuf, reason: String },

    /// The vector source could not be decoded.
    #[error("vector {}: {reason}", path.display())]
    Vector { path: PathBuf, reason: String },

    /// A polygon record carries an unusable geometry.
    #[error("parcel {parcel}: invalid geometry: {reason}")]
    Geometry { parcel: usize, reason: String },

    /// Raster band count and date label count disagree.
    #[error("alignment error: raster has {bands} band(s) but the date list has {labels} label(s)")]
    BandCountMismatch { bands: usize, labels: usize },

    /// A polygon footprint does not overlap the raster extent.
    #[error("alignment error: parcel {parcel} does not overlap the raster extent")]
    OutsideRaster { parcel: usize },

    /// A pixel window reaches past the raster grid.
    #[error("pixel window {window:?} exceeds the {width}×{height} raster")]
    WindowOutOfBounds { window: Window, width: usize, height: usize },

    /// A date label line does not match the expected fixed-width format.
    #[error("date label line {line}: {reason}")]
    DateLabel { line: usize, reason: String },

    /// Two output columns would share a name.
    #[error("output column '{column}' is defined more than once")]
    ColumnCollision { column: String },

    /// Invalid run configuration.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// The CSV sink rejected a write.
    #[error("csv output {}: {reason}", path.display())]
    Csv { path: PathBuf, reason: String },
}

impl ZonalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ZonalError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for band/label mismatches and polygons outside the raster.
    pub fn is_alignment(&self) -> bool {
        matches!(
            self,
            ZonalError::BandCountMismatch { .. } | ZonalError::OutsideRaster { .. }
        )
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Loaded,
    GeometryPrepared,
    Extracted,
    Reduced,
    Assembled,
    Written,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "load",
            Stage::GeometryPrepared => "geometry preparation",
            Stage::Extracted => "extraction",
            Stage::Reduced => "reduction",
            Stage::Assembled => "table assembly",
            Stage::Written => "output write",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a pipeline run: the stage that failed, the input
/// pair being processed, and the underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed (raster {}, vector {}): {source}", raster.display(), vector.display())]
pub struct PipelineError {
    pub stage: Stage,
    pub raster: PathBuf,
    pub vector: PathBuf,
    #[source]
    pub source: ZonalError,
}

pub type Result<T> = std::result::Result<T, ZonalError>;
