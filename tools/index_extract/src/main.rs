/// Parcel index extraction: one CSV of per-parcel percentile time series per
/// vegetation index stack.
///
/// Rasters are resolved from a template such as `data/stack_{INDEX}_2019.tif`
/// where `{INDEX}` becomes the upper-case index name and `{index}` the
/// lower-case one. Date files sit next to each raster
/// (`stack_NDVI_2019.tif` → `dates_ndvi_2019.txt`) unless a dates template
/// is given. A JSON run file (`--config`) can list the runs explicitly.
mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use parcel_core::pipeline::{run, RunRequest};
use parcel_core::RunConfig;
use serde::Deserialize;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "index_extract",
    about = "Per-parcel percentile of every band of stacked index rasters, written as wide CSV"
)]
struct Args {
    /// Polygon shapefile (.shp with sibling .dbf)
    #[arg(long, required_unless_present = "config")]
    vector: Option<PathBuf>,

    /// Raster path template; {INDEX} / {index} expand to the index name
    #[arg(long, default_value = "stack_{INDEX}_2019.tif")]
    raster_template: String,

    /// Date file template; derived from each raster name when omitted
    #[arg(long)]
    dates_template: Option<String>,

    /// Comma-separated index names
    #[arg(long, value_delimiter = ',', default_value = "evi2,ndvi,ndwi,savi")]
    indices: Vec<String>,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Inward buffer distance in CRS units
    #[arg(long)]
    shrink: Option<f64>,

    /// Percentile rank, 0-100
    #[arg(long)]
    percentile: Option<f64>,

    /// Characters dropped from the front of each date label
    #[arg(long)]
    date_prefix_width: Option<usize>,

    /// JSON run file listing the runs explicitly (replaces the template flags)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── JSON schema for the run file ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunFile {
    vector: PathBuf,
    output_dir: PathBuf,
    #[serde(default)]
    config: RunConfig,
    runs: Vec<RunEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunEntry {
    suffix: String,
    raster: PathBuf,
    #[serde(default)]
    dates: Option<PathBuf>,
}

// ── Planning ─────────────────────────────────────────────────────────────────

fn expand(template: &str, index: &str) -> String {
    template
        .replace("{INDEX}", &index.to_uppercase())
        .replace("{index}", &index.to_lowercase())
}

fn load_run_file(path: &Path) -> Result<RunFile> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Requests from the template flags, one per index name.
fn plan_from_flags(args: &Args) -> Result<Vec<RunRequest>> {
    let Some(vector) = &args.vector else {
        bail!("--vector is required unless --config is given");
    };
    let indices: Vec<String> = args
        .indices
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if indices.is_empty() {
        bail!("no index names given");
    }
    let templated = |t: &str| t.contains("{INDEX}") || t.contains("{index}");
    if indices.len() > 1 && !templated(&args.raster_template) {
        bail!(
            "raster template '{}' has no {{INDEX}} or {{index}} placeholder but {} indices were requested",
            args.raster_template,
            indices.len()
        );
    }

    Ok(indices
        .into_iter()
        .map(|index| RunRequest {
            raster: PathBuf::from(expand(&args.raster_template, &index)),
            vector: vector.clone(),
            dates: args.dates_template.as_deref().map(|t| PathBuf::from(expand(t, &index))),
            output_dir: args.output.clone(),
            suffix: index,
        })
        .collect())
}

fn plan_from_file(file: RunFile) -> (Vec<RunRequest>, RunConfig) {
    let requests = file
        .runs
        .into_iter()
        .map(|entry| RunRequest {
            raster: entry.raster,
            vector: file.vector.clone(),
            dates: entry.dates,
            output_dir: file.output_dir.clone(),
            suffix: entry.suffix,
        })
        .collect();
    (requests, file.config)
}

/// CLI tunables override the run file, which overrides the defaults.
fn apply_overrides(mut config: RunConfig, args: &Args) -> RunConfig {
    if let Some(d) = args.shrink {
        config.shrink_distance = d;
    }
    if let Some(q) = args.percentile {
        config.percentile = q;
    }
    if let Some(w) = args.date_prefix_width {
        config.date_prefix_width = w;
    }
    config
}

fn plan(args: &Args) -> Result<(Vec<RunRequest>, RunConfig)> {
    let (requests, config) = match &args.config {
        Some(path) => plan_from_file(load_run_file(path)?),
        None => (plan_from_flags(args)?, RunConfig::default()),
    };
    let config = apply_overrides(config, args);
    config.validate().context("invalid run configuration")?;
    Ok((requests, config))
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let (requests, config) = plan(&args)?;
    info!(runs = requests.len(), ?config, "starting extraction");

    for request in &requests {
        let report = run(request, &config).with_context(|| format!("index '{}'", request.suffix))?;
        println!(
            "{}: {} rows × {} dates → {} (removed {} of {} input rows)",
            report.suffix,
            report.rows_written,
            report.bands,
            report.output.display(),
            report.invalid + report.degenerate,
            report.input_rows
        );
    }
    Ok(())
}
