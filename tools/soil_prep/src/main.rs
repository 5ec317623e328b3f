//! Soil input preparation for Ecosse runs.
//! Reads an HWSD import (soil groups per mu_global + AOI grid cells), simplifies
//! both, joins them and writes per-cell soil rows plus no-data dumps as CSV.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use ecosse_soil::{
    join_rows, parse_aoi_cells, simplify_aoi_cells, simplify_soil_groups, write_outputs, MuGlobal,
    BoundingBox, PrepConfig, RecordError, SoilRecord,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "soil_prep", about = "Simplify HWSD soil groups and AOI cells into Ecosse soil rows")]
struct Args {
    /// Import JSON: { "soil_groups": {mu_global: [[metrics.., share]]}, "aoi_cells": [[row, col, lat, lon, area, {mu_global: proportion}]] }
    #[arg(short, long)]
    input: PathBuf,

    /// Config JSON; written with defaults if absent.
    #[arg(short, long, default_value = "soil_prep_config.json")]
    config: PathBuf,

    /// Output directory (overrides the config file).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable dominant-soil reduction. Mapping units that still hold more than
    /// one distinct soil after merging duplicates are then dropped from the
    /// output and reported in a warning.
    #[arg(long)]
    no_dominant: bool,

    /// Drop cells whose centre lies outside the configured bounding box.
    #[arg(long)]
    bbox_filter: bool,

    /// Fail when any record is malformed instead of skipping it.
    #[arg(long)]
    strict: bool,
}

// ── Import schema ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ImportFile {
    soil_groups: BTreeMap<MuGlobal, Vec<SoilRecord>>,
    aoi_cells: Vec<serde_json::Value>,
}

fn read_import(path: &Path) -> Result<ImportFile> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn report_rejected(what: &str, rejected: &[RecordError], strict: bool) -> Result<()> {
    if rejected.is_empty() {
        return Ok(());
    }
    for r in rejected {
        warn!("{r}");
    }
    if strict {
        bail!("{} malformed {what} (strict mode)", rejected.len());
    }
    warn!("{} malformed {what} skipped", rejected.len());
    Ok(())
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = PrepConfig::load_or_create(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if args.no_dominant {
        config.use_dominant_soil = false;
    }
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }
    let bbox: BoundingBox = config.bbox;
    info!(
        study = %config.study,
        area_km2 = %format!("{:.1}", bbox.area_km2()),
        use_dominant_soil = config.use_dominant_soil,
        "study settings"
    );

    let import = read_import(&args.input)?;
    info!(
        mu_globals = import.soil_groups.len(),
        cells = import.aoi_cells.len(),
        "read {}",
        args.input.display()
    );

    let (mut cells, bad_cells) = parse_aoi_cells(&import.aoi_cells);
    report_rejected("AOI cells", &bad_cells, args.strict)?;

    if args.bbox_filter {
        let before = cells.len();
        cells = bbox.filter_cells(cells);
        info!(kept = cells.len(), dropped = before - cells.len(), "bounding box filter");
    }

    let soils = simplify_soil_groups(&import.soil_groups, &config.simplify_config());
    report_rejected("soil groups", &soils.rejected, args.strict)?;
    if !soils.stats.unresolved.is_empty() {
        warn!(
            "{} mapping units dropped with distinct soils remaining; enable use_dominant_soil to keep them",
            soils.stats.unresolved.len()
        );
    }

    let aoi = simplify_aoi_cells(&cells);
    let joined = join_rows(&soils.groups, &aoi.cells);
    let summary = write_outputs(&config.output_dir, &joined, config.layout, config.zeros_file)
        .with_context(|| format!("writing outputs to {}", config.output_dir.display()))?;

    if let Some(path) = config
        .write_study_definition(&config.output_dir)
        .context("writing study definition")?
    {
        info!(path = %path.display(), "wrote study definition");
    }

    eprintln!("\nDone. {} rows -> {}", summary.n_rows, summary.rows_path.display());
    Ok(())
}
