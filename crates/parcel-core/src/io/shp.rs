//! ESRI Shapefile polygon loader.
//!
//! Geometry comes from the `.shp`, attributes from the sibling `.dbf`; the two
//! are paired by record position. Records whose geometry cannot be turned into
//! a polygon (null shapes, points, lines, broken rings) are skipped and counted
//! in `ParcelLayer::invalid`.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::{Contains, Coord, LineString, MultiPolygon, Polygon};
use shapefile::dbase::{self, FieldValue};
use shapefile::{PolygonRing, Shape, ShapeReader};
use tracing::{info, warn};

use crate::error::{Result, ZonalError};
use crate::parcel::{AttributeValue, Parcel, ParcelLayer};

/// Read every polygon record of the shapefile at `path`.
pub fn read_parcels(path: &Path) -> Result<ParcelLayer> {
    let vector_err = |reason: String| ZonalError::Vector {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| ZonalError::io(path, e))?;
    let shapes = ShapeReader::new(BufReader::new(file))
        .and_then(|reader| reader.read())
        .map_err(|e| match e {
            shapefile::Error::IoError(source) => ZonalError::io(path, source),
            other => vector_err(format!("cannot read shapes: {other}")),
        })?;

    let dbf_path = path.with_extension("dbf");
    let file = File::open(&dbf_path).map_err(|e| ZonalError::io(&dbf_path, e))?;
    let mut table = dbase::Reader::new(BufReader::new(file))
        .map_err(|e| vector_err(format!("cannot read {}: {e}", dbf_path.display())))?;
    let fields: Vec<String> = table
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect();
    let records = table
        .read()
        .map_err(|e| vector_err(format!("cannot read attributes: {e}")))?;

    if shapes.len() != records.len() {
        return Err(vector_err(format!(
            "{} shape(s) but {} attribute record(s)",
            shapes.len(),
            records.len()
        )));
    }

    let mut layer = ParcelLayer {
        fields,
        ..ParcelLayer::default()
    };
    for (index, (shape, record)) in shapes.into_iter().zip(records).enumerate() {
        let geometry = match shape_to_multipolygon(index, shape) {
            Ok(g) => g,
            Err(e) => {
                warn!(parcel = index, error = %e, "skipping record");
                layer.invalid += 1;
                continue;
            }
        };
        let attributes = layer
            .fields
            .iter()
            .map(|name| record.get(name).map_or(AttributeValue::Null, attribute_value))
            .collect();
        layer.parcels.push(Parcel {
            index,
            geometry,
            attributes,
        });
    }

    info!(
        path = %path.display(),
        parcels = layer.len(),
        invalid = layer.invalid,
        fields = layer.fields.len(),
        "vector layer loaded"
    );
    Ok(layer)
}

/// Convert one shapefile record into a multipolygon.
///
/// Every outer ring opens a new polygon. An inner ring is attached to the
/// polygon whose exterior contains its first vertex, or to the most recent
/// polygon when none does.
pub fn shape_to_multipolygon(index: usize, shape: Shape) -> Result<MultiPolygon<f64>> {
    let rings = match shape {
        Shape::Polygon(p) => collect_rings(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::PolygonM(p) => collect_rings(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::PolygonZ(p) => collect_rings(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::NullShape => return Err(geometry_err(index, "null shape")),
        other => return Err(geometry_err(index, &format!("{:?} is not a polygon", other.shapetype()))),
    };

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for (outer, coords) in rings {
        if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(geometry_err(index, "non-finite coordinate"));
        }
        let ring = LineString::new(coords);
        if ring.0.len() < 4 {
            return Err(geometry_err(index, "ring has fewer than 4 vertices"));
        }

        if outer {
            polygons.push(Polygon::new(ring, Vec::new()));
            continue;
        }
        let first = ring.0[0];
        let host = polygons
            .iter()
            .position(|p| p.contains(&first))
            .or_else(|| polygons.len().checked_sub(1))
            .ok_or_else(|| geometry_err(index, "inner ring precedes every outer ring"))?;
        polygons[host].interiors_push(ring);
    }

    if polygons.is_empty() {
        return Err(geometry_err(index, "polygon has no rings"));
    }
    Ok(MultiPolygon::new(polygons))
}

fn collect_rings<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> Vec<(bool, Vec<Coord<f64>>)> {
    rings
        .iter()
        .map(|ring| match ring {
            PolygonRing::Outer(points) => (true, points.iter().map(&xy).collect()),
            PolygonRing::Inner(points) => (false, points.iter().map(&xy).collect()),
        })
        .collect()
}

fn geometry_err(parcel: usize, reason: &str) -> ZonalError {
    ZonalError::Geometry {
        parcel,
        reason: reason.to_string(),
    }
}

/// Map a dBase cell to the value written to the output table.
pub fn attribute_value(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => AttributeValue::Text(s.trim_end().to_string()),
        FieldValue::Numeric(Some(v)) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
            AttributeValue::Integer(*v as i64)
        }
        FieldValue::Numeric(Some(v)) => AttributeValue::Float(*v),
        FieldValue::Float(Some(v)) => AttributeValue::Float(f64::from(*v)),
        FieldValue::Double(v) => AttributeValue::Float(*v),
        FieldValue::Integer(v) => AttributeValue::Integer(i64::from(*v)),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(*b),
        FieldValue::Date(Some(d)) => {
            AttributeValue::Date(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        FieldValue::Memo(s) => AttributeValue::Text(s.clone()),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => AttributeValue::Null,
        #[allow(unreachable_patterns)]
        other => AttributeValue::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use shapefile::dbase::{FieldName, Record, TableWriterBuilder};
    use shapefile::{Point, Polygon as ShpPolygon, Writer};

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point> {
        // Clockwise, as shapefile outer rings are stored.
        vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + size),
            Point::new(x0 + size, y0 + size),
            Point::new(x0 + size, y0),
            Point::new(x0, y0),
        ]
    }

    #[test]
    fn outer_and_inner_rings_form_one_polygon() {
        let shape = Shape::Polygon(ShpPolygon::with_rings(vec![
            PolygonRing::Outer(square(0.0, 0.0, 100.0)),
            PolygonRing::Inner(square(40.0, 40.0, 20.0).into_iter().rev().collect()),
        ]));
        let mp = shape_to_multipolygon(0, shape).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!((mp.unsigned_area() - (10_000.0 - 400.0)).abs() < 1e-9);
    }

    #[test]
    fn two_outer_rings_form_a_multipolygon() {
        let shape = Shape::Polygon(ShpPolygon::with_rings(vec![
            PolygonRing::Outer(square(0.0, 0.0, 10.0)),
            PolygonRing::Outer(square(50.0, 0.0, 10.0)),
        ]));
        let mp = shape_to_multipolygon(0, shape).unwrap();
        assert_eq!(mp.0.len(), 2);
    }

    #[test]
    fn null_and_point_shapes_are_rejected() {
        let err = shape_to_multipolygon(4, Shape::NullShape).unwrap_err();
        assert!(matches!(err, ZonalError::Geometry { parcel: 4, .. }));
        let err = shape_to_multipolygon(5, Shape::Point(Point::new(1.0, 2.0))).unwrap_err();
        assert!(matches!(err, ZonalError::Geometry { parcel: 5, .. }));
    }

    #[test]
    fn dbase_values_map_to_attributes() {
        assert_eq!(
            attribute_value(&FieldValue::Character(Some("maize  ".into()))),
            AttributeValue::Text("maize".into())
        );
        assert_eq!(attribute_value(&FieldValue::Numeric(Some(1042.0))), AttributeValue::Integer(1042));
        assert_eq!(attribute_value(&FieldValue::Numeric(Some(2.5))), AttributeValue::Float(2.5));
        assert_eq!(attribute_value(&FieldValue::Numeric(None)), AttributeValue::Null);
        assert_eq!(attribute_value(&FieldValue::Logical(Some(true))), AttributeValue::Bool(true));
        assert_eq!(attribute_value(&FieldValue::Character(None)), AttributeValue::Null);
    }

    #[test]
    fn reads_shapes_and_attributes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.shp");
        {
            let table = TableWriterBuilder::new()
                .add_numeric_field(FieldName::try_from("GERK_PID").unwrap(), 10, 0)
                .add_character_field(FieldName::try_from("CROP").unwrap(), 20);
            let mut writer = Writer::from_path(&path, table).unwrap();
            for (id, crop, x0) in [(11.0, "maize", 0.0), (12.0, "wheat", 200.0)] {
                let polygon = ShpPolygon::new(PolygonRing::Outer(square(x0, 0.0, 100.0)));
                let mut record = Record::default();
                record.insert("GERK_PID".to_string(), FieldValue::Numeric(Some(id)));
                record.insert("CROP".to_string(), FieldValue::Character(Some(crop.to_string())));
                writer.write_shape_and_record(&polygon, &record).unwrap();
            }
        }

        let layer = read_parcels(&path).unwrap();
        assert_eq!(layer.fields, vec!["GERK_PID", "CROP"]);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.invalid, 0);
        assert_eq!(layer.parcels[1].index, 1);
        assert_eq!(layer.parcels[1].attributes[0], AttributeValue::Integer(12));
        assert_eq!(layer.parcels[1].attributes[1], AttributeValue::Text("wheat".into()));
        assert!((layer.parcels[0].geometry.unsigned_area() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn missing_shp_is_an_io_error_naming_it() {
        let err = read_parcels(Path::new("/nonexistent/parcels.shp")).unwrap_err();
        match err {
            ZonalError::Io { path, source } => {
                assert!(path.ends_with("parcels.shp"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn missing_dbf_is_an_io_error_naming_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.shp");
        {
            let table = TableWriterBuilder::new().add_numeric_field(FieldName::try_from("ID").unwrap(), 10, 0);
            let mut writer = Writer::from_path(&path, table).unwrap();
            let mut record = Record::default();
            record.insert("ID".to_string(), FieldValue::Numeric(Some(1.0)));
            let polygon = ShpPolygon::new(PolygonRing::Outer(square(0.0, 0.0, 10.0)));
            writer.write_shape_and_record(&polygon, &record).unwrap();
        }
        std::fs::remove_file(path.with_extension("dbf")).unwrap();

        match read_parcels(&path).unwrap_err() {
            ZonalError::Io { path, .. } => assert!(path.ends_with("parcels.dbf")),
            other => panic!("unexpected error {other}"),
        }
    }
}
