//! Run driver: load → prepare → extract/reduce → assemble → write.
//!
//! Every stage either advances the run or aborts it with a `PipelineError`
//! naming the stage and the raster/vector pair. The CSV only appears once the
//! whole table has been assembled.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RunConfig;
use crate::dates::{dates_path_for, DateLabels};
use crate::error::{PipelineError, Result, Stage, ZonalError};
use crate::geometry::prepare;
use crate::io::{open_stack, read_parcels};
use crate::parcel::ParcelLayer;
use crate::raster::BandSource;
use crate::table::{assemble, ResultTable};
use crate::zonal::zonal_percentiles;

// ── Request / report ─────────────────────────────────────────────────────────

/// One raster stack paired with one polygon layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub raster: PathBuf,
    pub vector: PathBuf,
    /// Date label file; derived from the raster name when absent.
    #[serde(default)]
    pub dates: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Index name used as the column prefix and output file suffix.
    pub suffix: String,
}

impl RunRequest {
    /// Date label file of this run.
    pub fn dates_path(&self) -> Result<PathBuf> {
        match &self.dates {
            Some(p) => Ok(p.clone()),
            None => dates_path_for(&self.raster, &self.suffix),
        }
    }

    /// `<output_dir>/<vector stem>_<suffix>.csv`
    pub fn output_path(&self) -> Result<PathBuf> {
        let stem = self
            .vector
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ZonalError::Config {
                reason: format!("vector path {} has no file name", self.vector.display()),
            })?;
        Ok(self.output_dir.join(format!("{stem}_{}.csv", self.suffix)))
    }

    fn fail(&self, stage: Stage) -> impl FnOnce(ZonalError) -> PipelineError + '_ {
        move |source| PipelineError {
            stage,
            raster: self.raster.clone(),
            vector: self.vector.clone(),
            source,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub suffix: String,
    pub output: PathBuf,
    /// Records in the vector source, including rejected ones.
    pub input_rows: usize,
    /// Records rejected at load for unusable geometry.
    pub invalid: usize,
    /// Polygons that vanished when shrunk.
    pub degenerate: usize,
    pub rows_written: usize,
    pub bands: usize,
}

/// In-memory result of `process`.
#[derive(Debug, Clone)]
pub struct Processed {
    pub table: ResultTable,
    pub degenerate: usize,
}

// ── Stages ───────────────────────────────────────────────────────────────────

/// Run the pipeline on an opened raster source and loaded inputs. Nothing is
/// written.
pub fn process<S: BandSource + Send>(
    request: &RunRequest,
    source: &mut S,
    layer: &ParcelLayer,
    labels: &DateLabels,
    config: &RunConfig,
) -> std::result::Result<Processed, PipelineError> {
    config.validate().map_err(request.fail(Stage::Loaded))?;
    labels
        .check_band_count(source.band_count())
        .map_err(request.fail(Stage::Loaded))?;
    let columns = labels
        .column_names(&request.suffix, config.date_prefix_width)
        .map_err(request.fail(Stage::Loaded))?;

    let prepared = prepare(layer, config.shrink_distance);

    let stats = zonal_percentiles(source, &prepared.parcels, config.percentile)
        .map_err(request.fail(Stage::Extracted))?;
    info!(
        suffix = %request.suffix,
        parcels = stats.len(),
        percentile = config.percentile,
        "bands reduced"
    );

    let table = assemble(layer, &prepared.parcels, stats, columns).map_err(request.fail(Stage::Assembled))?;
    Ok(Processed {
        table,
        degenerate: prepared.degenerate,
    })
}

/// Execute one run end to end and write its CSV.
pub fn run(request: &RunRequest, config: &RunConfig) -> std::result::Result<RunReport, PipelineError> {
    config.validate().map_err(request.fail(Stage::Loaded))?;

    let dates_path = request.dates_path().map_err(request.fail(Stage::Loaded))?;
    let labels = DateLabels::read(&dates_path).map_err(request.fail(Stage::Loaded))?;
    let mut stack = open_stack(&request.raster).map_err(request.fail(Stage::Loaded))?;
    // Fail before reading the vector or doing any geometry work.
    labels
        .check_band_count(stack.band_count())
        .map_err(request.fail(Stage::Loaded))?;
    let layer = read_parcels(&request.vector).map_err(request.fail(Stage::Loaded))?;

    let processed = process(request, &mut stack, &layer, &labels, config)?;

    let output = request.output_path().map_err(request.fail(Stage::Written))?;
    write_atomically(&processed.table, &output).map_err(request.fail(Stage::Written))?;

    let report = RunReport {
        suffix: request.suffix.clone(),
        output,
        input_rows: layer.source_rows(),
        invalid: layer.invalid,
        degenerate: processed.degenerate,
        rows_written: processed.table.rows.len(),
        bands: stack.band_count(),
    };
    info!(
        suffix = %report.suffix,
        output = %report.output.display(),
        rows = report.rows_written,
        removed = report.invalid + report.degenerate,
        "table written"
    );
    Ok(report)
}

/// Write to a sibling file first so a failed write never leaves a truncated CSV
/// under the final name.
fn write_atomically(table: &ResultTable, output: &Path) -> Result<()> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ZonalError::io(dir, e))?;
    }
    let partial = output.with_extension("csv.part");
    if let Err(e) = table.write_csv(&partial) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::rename(&partial, output).map_err(|e| ZonalError::io(output, e))
}
