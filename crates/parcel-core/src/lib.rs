//! parcel-core: per-polygon percentile time series from stacked index rasters.
//!
//! A run pairs one multi-band raster stack (one band per acquisition date)
//! with one polygon layer. Every polygon is shrunk inward, the stack is
//! cropped and masked to it, each band is reduced to a percentile, and the
//! results are written as one wide CSV row per polygon.
pub mod config;
pub mod dates;
pub mod error;
pub mod geometry;
pub mod io;
pub mod parcel;
pub mod pipeline;
pub mod raster;
pub mod table;
pub mod zonal;

pub use config::RunConfig;
pub use error::{PipelineError, Stage, ZonalError};
pub use pipeline::{run, RunReport, RunRequest};
