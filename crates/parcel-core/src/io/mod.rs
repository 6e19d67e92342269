//! Source readers: GeoTIFF stacks and polygon shapefiles.
pub mod geotiff;
pub mod shp;

pub use geotiff::{open_stack, GeoTiffStack};
pub use shp::read_parcels;
