//! Per-polygon crop and all-touched mask of a raster stack.
//!
//! The output window is the smallest pixel window enclosing the polygon's
//! bounding box, clipped to the raster; only that window is read from the
//! source. Inside it a pixel keeps its value when the polygon reaches into the
//! pixel cell, including cells crossed only by the boundary; every other pixel
//! becomes NaN. Polygons narrower than one pixel therefore still select the
//! pixels they cross.
//!
//! A cell that meets the polygon only along one of its edges or at a corner is
//! not touched. The same rule holds on the bounding-box edge, where the crop
//! already leaves such cells out, and inside it (the inner edge of an L).
use geo::{coord, BoundingRect, Intersects, MultiPolygon, Rect};

use crate::error::{Result, ZonalError};
use crate::raster::{BandSource, GeoTransform, RasterGrid, Window};

/// Fraction of a pixel trimmed from each side of a cell before the
/// intersection test, so that contact along an edge or corner does not count.
const EDGE_TOLERANCE: f64 = 1e-7;

/// Cropped, masked view of every band for one polygon.
#[derive(Debug, Clone)]
pub struct MaskedWindow {
    pub window: Window,
    /// One row-major `window.width × window.height` array per band.
    pub bands: Vec<Vec<f32>>,
}

/// Pixel window enclosing `geometry` on `grid`.
///
/// `parcel` is the source row of the polygon and only tags errors.
/// Fails with `OutsideRaster` when the footprint misses the raster.
pub fn locate(grid: &RasterGrid, parcel: usize, geometry: &MultiPolygon<f64>) -> Result<Window> {
    let bbox = geometry.bounding_rect().ok_or_else(|| ZonalError::Geometry {
        parcel,
        reason: "geometry is empty".into(),
    })?;
    let (min, max) = (bbox.min(), bbox.max());
    grid.window_for_bounds(min.x, min.y, max.x, max.y)
        .ok_or(ZonalError::OutsideRaster { parcel })
}

/// Set every pixel of `bands` the polygon does not touch to NaN.
pub fn mask_window(
    transform: &GeoTransform,
    window: Window,
    mut bands: Vec<Vec<f32>>,
    geometry: &MultiPolygon<f64>,
) -> MaskedWindow {
    let mask = touched_mask(transform, &window, geometry);
    for band in &mut bands {
        for (v, &keep) in band.iter_mut().zip(&mask) {
            if !keep {
                *v = f32::NAN;
            }
        }
    }
    MaskedWindow { window, bands }
}

/// Crop `source` to the footprint of `geometry` and mask outside pixels.
pub fn extract<S: BandSource + ?Sized>(
    source: &mut S,
    parcel: usize,
    geometry: &MultiPolygon<f64>,
) -> Result<MaskedWindow> {
    let grid = source.grid();
    let window = locate(&grid, parcel, geometry)?;
    let bands = source.read_window(&window)?;
    Ok(mask_window(&grid.transform, window, bands, geometry))
}

/// All-touched rasterisation of `geometry` over `window`, row-major.
pub fn touched_mask(transform: &GeoTransform, window: &Window, geometry: &MultiPolygon<f64>) -> Vec<bool> {
    let inset_x = transform.pixel_width.abs() * EDGE_TOLERANCE;
    let inset_y = transform.pixel_height.abs() * EDGE_TOLERANCE;
    let mut mask = Vec::with_capacity(window.width * window.height);
    for r in 0..window.height {
        for c in 0..window.width {
            let (x0, y0, x1, y1) = transform.cell_bounds(window.row_off + r, window.col_off + c);
            let cell = Rect::new(
                coord! { x: x0 + inset_x, y: y0 + inset_y },
                coord! { x: x1 - inset_x, y: y1 - inset_y },
            );
            mask.push(geometry.intersects(&cell));
        }
    }
    mask
}
