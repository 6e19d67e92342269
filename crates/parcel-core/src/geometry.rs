//! Geometry preparation: inward buffer and degenerate-polygon filtering.
//!
//! Every polygon is shrunk by a fixed distance so that edge pixels shared with
//! neighbouring parcels do not contaminate the statistic. Polygons that vanish
//! (shrunk area ≤ 0) are dropped and counted, never zero-filled. Multi-part
//! results are kept whole.
use geo::orient::{Direction, Orient};
use geo::{Area, Buffer, MultiPolygon};
use tracing::{debug, info};

use crate::parcel::ParcelLayer;

/// A polygon that survived shrinking.
#[derive(Debug, Clone)]
pub struct PreparedParcel {
    /// Position of the source record in `ParcelLayer::parcels`.
    pub slot: usize,
    /// Row position of the record in the vector source.
    pub index: usize,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PreparedParcels {
    /// Surviving parcels in source order.
    pub parcels: Vec<PreparedParcel>,
    /// Records dropped because their shrunk area is not positive.
    pub degenerate: usize,
}

/// Shrink a geometry inward by `distance`. The result may be empty.
pub fn shrink(geometry: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    let oriented = geometry.orient(Direction::Default);
    if distance == 0.0 {
        return oriented;
    }
    oriented.buffer(-distance)
}

/// Shrink every parcel of the layer and drop the ones that vanish.
pub fn prepare(layer: &ParcelLayer, shrink_distance: f64) -> PreparedParcels {
    let mut out = PreparedParcels::default();

    for (slot, parcel) in layer.parcels.iter().enumerate() {
        let shrunk = shrink(&parcel.geometry, shrink_distance);
        if shrunk.unsigned_area() > 0.0 {
            out.parcels.push(PreparedParcel {
                slot,
                index: parcel.index,
                geometry: shrunk,
            });
        } else {
            debug!(parcel = parcel.index, "shrunk polygon has no area, dropping");
            out.degenerate += 1;
        }
    }

    info!(
        kept = out.parcels.len(),
        removed = out.degenerate,
        shrink_distance,
        "geometry prepared"
    );
    out
}
