//! NaN-aware percentile reduction.
//!
//! Linear interpolation between closest ranks (numpy `linear`, R type 7)
//! over the non-NaN values only. An all-missing sample has no percentile.

/// Percentile `q` (0–100) of a pre-sorted, NaN-free slice.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    assert!(!sorted.is_empty(), "percentile_sorted: input must not be empty");
    let n = sorted.len();
    let h = (n - 1) as f64 * (q / 100.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// Percentile `q` of the non-NaN values in `values`; None when there are none.
pub fn nan_percentile(values: &[f32], q: f64) -> Option<f32> {
    let mut valid: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| f64::from(v))
        .collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(f64::total_cmp);
    Some(percentile_sorted(&valid, q) as f32)
}

/// One percentile per band across both spatial axes.
pub fn band_percentiles(bands: &[Vec<f32>], q: f64) -> Vec<Option<f32>> {
    bands.iter().map(|band| nan_percentile(band, q)).collect()
}
