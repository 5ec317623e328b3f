//! Area-of-interest cell simplification.
//!
//! A grid cell may straddle several mapping units. Simplifying keeps only the
//! mapping unit with the largest proportion and hands it the cell's whole
//! proportion mass.

#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{RecordError, RecordId, Result, SoilError};
use crate::record::MuGlobal;

/// Fields in an imported cell tuple: row, col, lat, lon, area, proportions.
pub const AOI_TUPLE_LEN: usize = 6;

/// One grid cell of the area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct AoiCell {
    pub grid_row: u32,
    pub grid_col: u32,
    pub lat: f64,
    pub lon: f64,
    pub area: f64,
    /// Mapping-unit area weights in import order.
    pub proportions: Vec<(MuGlobal, f64)>,
}

impl AoiCell {
    /// Parse `[row, col, lat, lon, area, {"mu_global": proportion, ...}]`.
    /// `index` is the cell's position in the import, used in error reports.
    pub fn from_tuple(index: usize, value: &Value) -> Result<Self> {
        let malformed = |reason: String| SoilError::MalformedCell { index, reason };

        let fields = value
            .as_array()
            .ok_or_else(|| malformed("expected an array".into()))?;
        if fields.len() != AOI_TUPLE_LEN {
            return Err(malformed(format!(
                "expected {AOI_TUPLE_LEN} fields, found {}",
                fields.len()
            )));
        }

        let grid_index = |v: &Value, name: &str| {
            v.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| malformed(format!("{name} is not a grid index: {v}")))
        };
        let number = |v: &Value, name: &str| {
            v.as_f64()
                .filter(|x| x.is_finite())
                .ok_or_else(|| malformed(format!("{name} is not a finite number: {v}")))
        };

        let map = fields[5]
            .as_object()
            .ok_or_else(|| malformed("proportions must be an object keyed by mu_global".into()))?;
        let mut proportions = Vec::with_capacity(map.len());
        for (key, weight) in map {
            let mu: MuGlobal = key
                .trim()
                .parse()
                .map_err(|_| malformed(format!("mu_global key {key:?} is not an integer")))?;
            if proportions.iter().any(|&(seen, _)| seen == mu) {
                return Err(malformed(format!("mu_global {mu} appears more than once")));
            }
            proportions.push((mu, number(weight, "proportion")?));
        }

        Ok(Self {
            grid_row: grid_index(&fields[0], "grid row")?,
            grid_col: grid_index(&fields[1], "grid column")?,
            lat: number(&fields[2], "latitude")?,
            lon: number(&fields[3], "longitude")?,
            area: number(&fields[4], "area")?,
            proportions,
        })
    }

    pub fn total_proportion(&self) -> f64 {
        self.proportions.iter().map(|&(_, p)| p).sum()
    }

    /// First mapping unit holding the largest proportion.
    pub fn dominant_mu(&self) -> Option<MuGlobal> {
        self.proportions
            .iter()
            .fold(None::<(MuGlobal, f64)>, |best, &(mu, p)| match best {
                Some(b) if b.1 >= p => Some(b),
                _ => Some((mu, p)),
            })
            .map(|(mu, _)| mu)
    }
}

/// Parse every imported cell tuple. Bad tuples are reported, not fatal.
pub fn parse_aoi_cells(values: &[Value]) -> (Vec<AoiCell>, Vec<RecordError>) {
    let mut cells = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for (index, value) in values.iter().enumerate() {
        match AoiCell::from_tuple(index, value) {
            Ok(cell) => cells.push(cell),
            Err(error) => {
                warn!(index, %error, "skipping malformed AOI cell");
                rejected.push(RecordError { id: RecordId::AoiCell(index), error });
            }
        }
    }
    (cells, rejected)
}

/// Why a cell produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No soil information under the cell.
    EmptyProportions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCell {
    pub index: usize,
    pub grid_row: u32,
    pub grid_col: u32,
    pub lat: f64,
    pub lon: f64,
    pub reason: SkipReason,
}

/// Output of [`simplify_aoi_cells`].
#[derive(Debug, Default)]
pub struct AoiSimplification {
    pub cells: Vec<AoiCell>,
    pub skipped: Vec<SkippedCell>,
}

/// Reduce a cell to its dominant mapping unit. `None` when the cell has no
/// mapping units at all.
pub fn simplify_aoi_cell(cell: &AoiCell) -> Option<AoiCell> {
    match cell.proportions.len() {
        0 => None,
        1 => Some(cell.clone()),
        _ => {
            let dominant = cell.dominant_mu()?;
            Some(AoiCell {
                proportions: vec![(dominant, cell.total_proportion())],
                ..cell.clone()
            })
        }
    }
}

/// Simplify every cell, dropping those without soil data.
pub fn simplify_aoi_cells(cells: &[AoiCell]) -> AoiSimplification {
    #[cfg(feature = "threading")]
    let simplified: Vec<Option<AoiCell>> = cells.par_iter().map(simplify_aoi_cell).collect();
    #[cfg(not(feature = "threading"))]
    let simplified: Vec<Option<AoiCell>> = cells.iter().map(simplify_aoi_cell).collect();

    let mut out = AoiSimplification {
        cells: Vec::with_capacity(cells.len()),
        skipped: Vec::new(),
    };
    for (index, (cell, result)) in cells.iter().zip(simplified).enumerate() {
        match result {
            Some(new_cell) => out.cells.push(new_cell),
            None => {
                warn!(
                    lat = %format!("{:.4}", cell.lat),
                    lon = %format!("{:.4}", cell.lon),
                    "no soil information for AOI cell, skipping"
                );
                out.skipped.push(SkippedCell {
                    index,
                    grid_row: cell.grid_row,
                    grid_col: cell.grid_col,
                    lat: cell.lat,
                    lon: cell.lon,
                    reason: SkipReason::EmptyProportions,
                });
            }
        }
    }

    info!(cells_in = cells.len(), cells_out = out.cells.len(), skipped = out.skipped.len(), "simplified AOI cells");
    out
}
