//! Window reads over single-image, N-sample GeoTIFFs in both planar layouts.
mod common;

use std::io::Cursor;

use common::{Georef, Layout, Stack};
use parcel_core::io::{open_stack, GeoTiffStack};
use parcel_core::raster::{BandSource, GeoTransform, Window};

const GEOREF: Georef = Georef {
    pixel: 10.0,
    origin_x: 500_000.0,
    origin_y: 100_060.0,
};

/// 4×6 grid, band `b` holds `100 * b + pixel index`.
fn bands(count: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|b| (0..24).map(|px| (100 * b + px) as f32).collect())
        .collect()
}

fn encode(bands: &[Vec<f32>], layout: Layout, rows_per_strip: u32, nodata: Option<&str>) -> Vec<u8> {
    Stack {
        width: 4,
        height: 6,
        bands,
        layout,
        rows_per_strip,
        georef: GEOREF,
        nodata,
    }
    .encode()
}

fn open(bytes: Vec<u8>) -> GeoTiffStack<Cursor<Vec<u8>>> {
    GeoTiffStack::new(Cursor::new(bytes), "stack.tif").unwrap()
}

const FULL: Window = Window {
    col_off: 0,
    row_off: 0,
    width: 4,
    height: 6,
};

#[test]
fn interleaved_samples_are_separate_bands() {
    let expected = bands(3);
    let mut stack = open(encode(&expected, Layout::Interleaved, 2, None));
    assert_eq!(stack.band_count(), 3);
    assert_eq!(stack.read_window(&FULL).unwrap(), expected);
}

#[test]
fn planar_samples_are_separate_bands() {
    let expected = bands(3);
    let mut stack = open(encode(&expected, Layout::Planar, 2, None));
    assert_eq!(stack.band_count(), 3);
    assert_eq!(stack.read_window(&FULL).unwrap(), expected);
}

#[test]
fn geokeys_of_a_multiband_image_give_the_grid() {
    let stack = open(encode(&bands(2), Layout::Interleaved, 6, None));
    let grid = stack.grid();
    assert_eq!((grid.width, grid.height), (4, 6));
    assert_eq!(grid.transform, GeoTransform::new(500_000.0, 100_060.0, 10.0, -10.0));
}

#[test]
fn nodata_is_missing_in_every_band() {
    let mut values = bands(2);
    values[0][5] = -9999.0;
    values[1][6] = -9999.0;
    let mut stack = open(encode(&values, Layout::Interleaved, 3, Some("-9999")));
    let read = stack.read_window(&FULL).unwrap();
    assert!(read[0][5].is_nan());
    assert!(read[1][6].is_nan());
    assert_eq!(read[0][6], 6.0);
    assert_eq!(read[1][5], 105.0);
}

#[test]
fn interleaved_window_decodes_only_its_strips() {
    let mut stack = open(encode(&bands(3), Layout::Interleaved, 1, None));
    let window = Window {
        col_off: 1,
        row_off: 2,
        width: 2,
        height: 2,
    };
    let read = stack.read_window(&window).unwrap();
    assert_eq!(read[0], vec![9.0, 10.0, 13.0, 14.0]);
    assert_eq!(read[2], vec![209.0, 210.0, 213.0, 214.0]);
    // Rows 2 and 3 are two strips holding all three samples.
    assert_eq!(stack.chunks_read(), 2);
}

#[test]
fn planar_window_decodes_its_strips_in_each_plane() {
    let mut stack = open(encode(&bands(3), Layout::Planar, 1, None));
    let window = Window {
        col_off: 1,
        row_off: 2,
        width: 2,
        height: 2,
    };
    let read = stack.read_window(&window).unwrap();
    assert_eq!(read[1], vec![109.0, 110.0, 113.0, 114.0]);
    assert_eq!(stack.chunks_read(), 2 * 3);
}

#[test]
fn stack_on_disk_opens_without_reading_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack_NDVI_2019.tif");
    std::fs::write(&path, encode(&bands(4), Layout::Interleaved, 2, None)).unwrap();

    let mut stack = open_stack(&path).unwrap();
    assert_eq!(stack.band_count(), 4);
    assert_eq!(stack.chunks_read(), 0);
    let corner = Window {
        col_off: 3,
        row_off: 5,
        width: 1,
        height: 1,
    };
    let read = stack.read_window(&corner).unwrap();
    assert_eq!(read, vec![vec![23.0], vec![123.0], vec![223.0], vec![323.0]]);
    assert_eq!(stack.chunks_read(), 1);
}
