//! Join simplified soil groups onto simplified AOI cells and write the
//! resulting rows as CSV.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::aoi::AoiCell;
use crate::error::{Result, SoilError};
use crate::record::{MuGlobal, SoilLayout, SoilRecord, METRICS_PER_LAYER, NO_DATA};

pub const ROWS_FILE: &str = "soil_rows.csv";
pub const NODATA_FILE: &str = "nodata_muglobal_cells.csv";
pub const ZEROS_FILE: &str = "zero_muglobal_cells.csv";

/// mu_global of cells over sea or without mapped soil.
pub const MU_GLOBAL_NONE: MuGlobal = 0;

const LAYER_METRICS: [&str; METRICS_PER_LAYER] = ["oc", "bulk", "ph", "sand", "silt", "clay"];

/// One output row: a soil of a mapping unit placed on a grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilRow {
    pub grid_row: u32,
    pub grid_col: u32,
    pub lat: f64,
    pub lon: f64,
    pub mu_global: MuGlobal,
    pub share: f64,
    pub metrics: Vec<f64>,
}

impl SoilRow {
    fn new(cell: &AoiCell, mu_global: MuGlobal, record: &SoilRecord) -> Self {
        Self {
            grid_row: cell.grid_row,
            grid_col: cell.grid_col,
            lat: cell.lat,
            lon: cell.lon,
            mu_global,
            share: record.share(),
            metrics: record.metrics().to_vec(),
        }
    }
}

#[derive(Debug, Default)]
pub struct JoinResult {
    pub rows: Vec<SoilRow>,
    /// Cells whose mapping unit has no soil group.
    pub nodata: Vec<AoiCell>,
    /// Cells whose mapping unit is [`MU_GLOBAL_NONE`].
    pub zeros: Vec<AoiCell>,
}

/// One row per surviving (mapping unit, soil) pair per cell.
pub fn join_rows(groups: &BTreeMap<MuGlobal, Vec<SoilRecord>>, cells: &[AoiCell]) -> JoinResult {
    let mut out = JoinResult::default();
    for cell in cells {
        for &(mu_global, _) in &cell.proportions {
            if mu_global == MU_GLOBAL_NONE {
                out.zeros.push(cell.clone());
                continue;
            }
            match groups.get(&mu_global) {
                Some(records) => out
                    .rows
                    .extend(records.iter().map(|r| SoilRow::new(cell, mu_global, r))),
                None => out.nodata.push(cell.clone()),
            }
        }
    }
    out
}

/// Column names. Both layers are always present.
pub fn header() -> Vec<String> {
    let mut cols: Vec<String> = ["grid_row", "grid_col", "latitude", "longitude", "mu_global", "share"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for prefix in ["t", "s"] {
        cols.extend(LAYER_METRICS.iter().map(|m| format!("{prefix}_{m}")));
    }
    cols
}

/// Write rows with `layout`'s metric count; missing sub-layer values become [`NO_DATA`].
pub fn write_rows<W: io::Write>(writer: W, rows: &[SoilRow], layout: SoilLayout) -> Result<()> {
    let expected = layout.shape().n_metrics;
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header())?;

    for row in rows {
        if row.metrics.len() != expected {
            return Err(SoilError::MalformedRecord {
                key: row.mu_global,
                expected: expected + 1,
                found: row.metrics.len() + 1,
            });
        }
        let mut record = vec![
            row.grid_row.to_string(),
            row.grid_col.to_string(),
            row.lat.to_string(),
            row.lon.to_string(),
            row.mu_global.to_string(),
            row.share.to_string(),
        ];
        record.extend(row.metrics.iter().map(f64::to_string));
        record.extend((row.metrics.len()..2 * METRICS_PER_LAYER).map(|_| NO_DATA.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Dump cells (no-data or zero mapping units) with their location.
pub fn write_cells<W: io::Write>(writer: W, cells: &[AoiCell]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["grid_row", "grid_col", "latitude", "longitude", "mu_global"])?;
    for cell in cells {
        let mus: Vec<String> = cell.proportions.iter().map(|(mu, _)| mu.to_string()).collect();
        wtr.write_record([
            cell.grid_row.to_string(),
            cell.grid_col.to_string(),
            cell.lat.to_string(),
            cell.lon.to_string(),
            mus.join(" "),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Paths written by [`write_outputs`].
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub rows_path: PathBuf,
    pub nodata_path: PathBuf,
    pub zeros_path: Option<PathBuf>,
    pub n_rows: usize,
}

/// Write the row file and the dump files into `out_dir`, replacing earlier runs.
pub fn write_outputs(out_dir: &Path, joined: &JoinResult, layout: SoilLayout, zeros_file: bool) -> Result<ExportSummary> {
    fs::create_dir_all(out_dir)?;

    let rows_path = out_dir.join(ROWS_FILE);
    write_rows(fs::File::create(&rows_path)?, &joined.rows, layout)?;

    let nodata_path = out_dir.join(NODATA_FILE);
    write_cells(fs::File::create(&nodata_path)?, &joined.nodata)?;

    let zeros_path = if zeros_file {
        let path = out_dir.join(ZEROS_FILE);
        write_cells(fs::File::create(&path)?, &joined.zeros)?;
        Some(path)
    } else {
        None
    };

    info!(
        rows = joined.rows.len(),
        nodata_cells = joined.nodata.len(),
        zero_cells = joined.zeros.len(),
        dir = %out_dir.display(),
        "wrote soil outputs"
    );
    Ok(ExportSummary {
        rows_path,
        nodata_path,
        zeros_path,
        n_rows: joined.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(mu: MuGlobal) -> AoiCell {
        AoiCell {
            grid_row: 1,
            grid_col: 2,
            lat: 28.5,
            lon: 116.95,
            area: 0.6,
            proportions: vec![(mu, 1.0)],
        }
    }

    fn groups() -> BTreeMap<MuGlobal, Vec<SoilRecord>> {
        let mut g = BTreeMap::new();
        g.insert(42, vec![SoilRecord::new(vec![1.0, 1.3, 6.5, 40.0, 30.0, 30.0, 100.0])]);
        g
    }

    #[test]
    fn join_routes_missing_and_zero_units() {
        let cells = vec![cell(42), cell(0), cell(77)];
        let joined = join_rows(&groups(), &cells);
        assert_eq!(joined.rows.len(), 1);
        assert_eq!(joined.rows[0].mu_global, 42);
        assert_eq!(joined.rows[0].share, 100.0);
        assert_eq!(joined.zeros, vec![cell(0)]);
        assert_eq!(joined.nodata, vec![cell(77)]);
    }

    #[test]
    fn header_has_both_layers() {
        let h = header();
        assert_eq!(h.len(), 6 + 2 * METRICS_PER_LAYER);
        assert_eq!(h[6], "t_oc");
        assert_eq!(h[17], "s_clay");
    }

    #[test]
    fn top_only_rows_pad_sub_layer_with_sentinel() {
        let joined = join_rows(&groups(), &[cell(42)]);
        let mut buf = Vec::new();
        write_rows(&mut buf, &joined.rows, SoilLayout::TopOnly).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert_eq!(
            line,
            "1,2,28.5,116.95,42,100,1,1.3,6.5,40,30,30,-999,-999,-999,-999,-999,-999"
        );
    }

    #[test]
    fn layout_mismatch_is_rejected() {
        let joined = join_rows(&groups(), &[cell(42)]);
        let err = write_rows(Vec::new(), &joined.rows, SoilLayout::TopAndSub).unwrap_err();
        assert!(matches!(err, SoilError::MalformedRecord { key: 42, expected: 13, found: 7 }));
    }
}
