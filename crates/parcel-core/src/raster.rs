use serde::{Deserialize, Serialize};

use crate::error::{Result, ZonalError};

/// North-up affine transform of a raster grid.
/// `origin_x`/`origin_y` is the outer corner of pixel (0, 0); `pixel_height`
/// is negative for the usual top-down row order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Fractional column of map x.
    #[inline]
    pub fn col_f(&self, x: f64) -> f64 {
        (x - self.origin_x) / self.pixel_width
    }

    /// Fractional row of map y.
    #[inline]
    pub fn row_f(&self, y: f64) -> f64 {
        (y - self.origin_y) / self.pixel_height
    }

    /// Map-space bounds `(min_x, min_y, max_x, max_y)` of cell `(row, col)`.
    pub fn cell_bounds(&self, row: usize, col: usize) -> (f64, f64, f64, f64) {
        let x0 = self.origin_x + col as f64 * self.pixel_width;
        let x1 = x0 + self.pixel_width;
        let y0 = self.origin_y + row as f64 * self.pixel_height;
        let y1 = y0 + self.pixel_height;
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

/// Pixel window into a raster: `col_off..col_off + width`, `row_off..row_off + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    /// True when the window lies entirely inside a `width × height` grid.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.col_off + self.width <= width && self.row_off + self.height <= height
    }
}

/// Size and georeferencing of a raster grid, without its pixel values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl RasterGrid {
    /// Map-space extent `(min_x, min_y, max_x, max_y)` of the whole grid.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let t = &self.transform;
        let x1 = t.origin_x + self.width as f64 * t.pixel_width;
        let y1 = t.origin_y + self.height as f64 * t.pixel_height;
        (t.origin_x.min(x1), t.origin_y.min(y1), t.origin_x.max(x1), t.origin_y.max(y1))
    }

    /// Minimal pixel window covering the map-space box, clipped to the grid.
    /// Returns None when the box does not overlap the raster.
    pub fn window_for_bounds(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<Window> {
        let t = &self.transform;
        let (c0, c1) = ordered(t.col_f(min_x), t.col_f(max_x));
        let (r0, r1) = ordered(t.row_f(min_y), t.row_f(max_y));

        let col_start = c0.floor().max(0.0);
        let col_end = c1.ceil().min(self.width as f64);
        let row_start = r0.floor().max(0.0);
        let row_end = r1.ceil().min(self.height as f64);

        if !(col_start < col_end && row_start < row_end) {
            return None;
        }
        Some(Window {
            col_off: col_start as usize,
            row_off: row_start as usize,
            width: (col_end - col_start) as usize,
            height: (row_end - row_start) as usize,
        })
    }
}

/// A multi-band raster read one pixel window at a time.
///
/// Implementors only need to hold what a single window read requires, so a
/// file-backed source keeps memory proportional to the window, not the raster.
pub trait BandSource {
    fn grid(&self) -> RasterGrid;

    fn band_count(&self) -> usize;

    /// Row-major values of every band inside `window`, in band order.
    /// Missing pixels are NaN.
    fn read_window(&mut self, window: &Window) -> Result<Vec<Vec<f32>>>;
}

/// An ordered stack of equally sized bands held in memory, one per time slice.
/// Pixel values are f32, row-major; NaN marks a missing pixel.
#[derive(Debug, Clone)]
pub struct RasterStack {
    /// One row-major grid per band, in band order.
    pub bands: Vec<Vec<f32>>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl RasterStack {
    /// Create a stack of `band_count` bands filled with the given value.
    pub fn new(width: usize, height: usize, band_count: usize, transform: GeoTransform, fill: f32) -> Self {
        Self {
            bands: vec![vec![fill; width * height]; band_count],
            width,
            height,
            transform,
        }
    }

    #[inline]
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.bands[band][row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, val: f32) {
        self.bands[band][row * self.width + col] = val;
    }

    pub fn grid(&self) -> RasterGrid {
        RasterGrid {
            width: self.width,
            height: self.height,
            transform: self.transform,
        }
    }

    pub fn extent(&self) -> (f64, f64, f64, f64) {
        self.grid().extent()
    }

    pub fn window_for_bounds(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<Window> {
        self.grid().window_for_bounds(min_x, min_y, max_x, max_y)
    }
}

impl BandSource for RasterStack {
    fn grid(&self) -> RasterGrid {
        RasterStack::grid(self)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn read_window(&mut self, window: &Window) -> Result<Vec<Vec<f32>>> {
        if !window.fits(self.width, self.height) {
            return Err(ZonalError::WindowOutOfBounds {
                window: *window,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self
            .bands
            .iter()
            .map(|band| {
                let mut out = Vec::with_capacity(window.width * window.height);
                for r in window.row_off..window.row_off + window.height {
                    let start = r * self.width + window.col_off;
                    out.extend_from_slice(&band[start..start + window.width]);
                }
                out
            })
            .collect())
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}
