//! Result table: polygon attributes + one statistic column per date.
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Result, ZonalError};
use crate::geometry::PreparedParcel;
use crate::parcel::{AttributeValue, ParcelLayer};
use crate::zonal::BandStats;

/// One output row: carried-through attributes then the statistic vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub attributes: Vec<AttributeValue>,
    pub values: BandStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub attribute_fields: Vec<String>,
    pub date_columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Full header: attribute fields followed by date columns.
    pub fn header(&self) -> Vec<&str> {
        self.attribute_fields
            .iter()
            .chain(self.date_columns.iter())
            .map(String::as_str)
            .collect()
    }

    /// Write the table as CSV. Missing statistics become empty cells.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let csv_err = |e: csv::Error| ZonalError::Csv {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let file = fs::File::create(path).map_err(|e| ZonalError::io(path, e))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(self.header()).map_err(csv_err)?;

        for row in &self.rows {
            let record = row
                .attributes
                .iter()
                .map(ToString::to_string)
                .chain(row.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
            writer.write_record(record).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| ZonalError::io(path, e))?;
        Ok(())
    }
}

/// Merge statistic vectors with the attributes of the surviving polygons.
///
/// `stats[i]` belongs to `prepared[i]`. Every vector must have exactly one
/// value per date column; a mismatch means the raster and the date list
/// disagree and fails the run instead of truncating or padding.
pub fn assemble(
    layer: &ParcelLayer,
    prepared: &[PreparedParcel],
    stats: Vec<BandStats>,
    date_columns: Vec<String>,
) -> Result<ResultTable> {
    let mut seen: HashSet<&str> = HashSet::new();
    for column in layer.fields.iter().chain(date_columns.iter()) {
        if !seen.insert(column.as_str()) {
            return Err(ZonalError::ColumnCollision { column: column.clone() });
        }
    }
    if stats.len() != prepared.len() {
        return Err(ZonalError::Config {
            reason: format!(
                "{} statistic vector(s) for {} polygon(s)",
                stats.len(),
                prepared.len()
            ),
        });
    }

    let mut rows = Vec::with_capacity(prepared.len());
    for (parcel, values) in prepared.iter().zip(stats) {
        if values.len() != date_columns.len() {
            return Err(ZonalError::BandCountMismatch {
                bands: values.len(),
                labels: date_columns.len(),
            });
        }
        let attributes = layer.parcels[parcel.slot].attributes.clone();
        rows.push(ResultRow { attributes, values });
    }

    Ok(ResultTable {
        attribute_fields: layer.fields.clone(),
        date_columns,
        rows,
    })
}
