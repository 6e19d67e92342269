//! Polygon records and their attribute values.

use std::fmt;

use geo::MultiPolygon;

/// A single attribute cell carried through the pipeline unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Calendar date already rendered as `YYYY-MM-DD`.
    Date(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Text(s) | AttributeValue::Date(s) => f.write_str(s),
            AttributeValue::Integer(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Bool(v) => f.write_str(if *v { "True" } else { "False" }),
        }
    }
}

/// One polygon feature of the vector source.
#[derive(Debug, Clone)]
pub struct Parcel {
    /// Row position in the source layer.
    pub index: usize,
    pub geometry: MultiPolygon<f64>,
    /// Attribute values in `ParcelLayer::fields` order.
    pub attributes: Vec<AttributeValue>,
}

/// All polygon features of one vector source plus its attribute schema.
#[derive(Debug, Clone, Default)]
pub struct ParcelLayer {
    pub fields: Vec<String>,
    pub parcels: Vec<Parcel>,
    /// Records rejected at load time because their geometry is unusable.
    pub invalid: usize,
}

impl ParcelLayer {
    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// Total records in the source, including those rejected at load time.
    pub fn source_rows(&self) -> usize {
        self.parcels.len() + self.invalid
    }
}
