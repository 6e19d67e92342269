//! Zonal statistics: per-polygon crop/mask → per-band percentile.
pub mod extract;
pub mod percentile;

pub use extract::{extract, locate, mask_window, touched_mask, MaskedWindow};
pub use percentile::{band_percentiles, nan_percentile};

use crate::error::Result;
use crate::geometry::PreparedParcel;
use crate::raster::BandSource;

/// Statistic vector of one polygon: one entry per band, None = no valid pixels.
pub type BandStats = Vec<Option<f32>>;

/// Extract and reduce one polygon.
pub fn parcel_stats<S: BandSource + ?Sized>(source: &mut S, parcel: &PreparedParcel, q: f64) -> Result<BandStats> {
    let window = extract(source, parcel.index, &parcel.geometry)?;
    Ok(band_percentiles(&window.bands, q))
}

/// Statistic vectors for all polygons, in input order.
///
/// Polygons are independent; with the `threading` feature they are processed
/// in parallel. Window reads go through the source one at a time, masking and
/// reduction run concurrently. The first failing polygon aborts the batch.
#[cfg(feature = "threading")]
pub fn zonal_percentiles<S: BandSource + Send>(
    source: &mut S,
    parcels: &[PreparedParcel],
    q: f64,
) -> Result<Vec<BandStats>> {
    use rayon::prelude::*;
    use std::sync::{Mutex, PoisonError};

    let grid = source.grid();
    let shared = Mutex::new(source);
    parcels
        .par_iter()
        .map(|parcel| {
            let window = locate(&grid, parcel.index, &parcel.geometry)?;
            let bands = shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .read_window(&window)?;
            let masked = mask_window(&grid.transform, window, bands, &parcel.geometry);
            Ok(band_percentiles(&masked.bands, q))
        })
        .collect()
}

/// Statistic vectors for all polygons, in input order.
#[cfg(not(feature = "threading"))]
pub fn zonal_percentiles<S: BandSource + Send>(
    source: &mut S,
    parcels: &[PreparedParcel],
    q: f64,
) -> Result<Vec<BandStats>> {
    parcels.iter().map(|p| parcel_stats(&mut *source, p, q)).collect()
}
