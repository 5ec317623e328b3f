use std::fmt;

use thiserror::Error;

use crate::record::MuGlobal;

/// Errors raised while simplifying or exporting soil data.
#[derive(Debug, Error)]
pub enum SoilError {
    /// A soil record whose length does not match the configured shape.
    #[error("mu_global {key}: soil record has {found} fields, expected {expected}")]
    MalformedRecord {
        key: MuGlobal,
        expected: usize,
        found: usize,
    },

    /// An AOI cell tuple that cannot be read as
    /// `[row, col, lat, lon, area, {mu_global: proportion}]`.
    #[error("AOI cell {index}: {reason}")]
    MalformedCell { index: usize, reason: String },

    #[error("invalid bounding box [{ll_lon}, {ll_lat}, {ur_lon}, {ur_lat}]: {reason}")]
    InvalidBoundingBox {
        ll_lon: f64,
        ll_lat: f64,
        ur_lon: f64,
        ur_lat: f64,
        reason: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, SoilError>;

/// Identity of a rejected input record, for per-record reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordId {
    SoilGroup(MuGlobal),
    AoiCell(usize),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::SoilGroup(key) => write!(f, "soil group {key}"),
            RecordId::AoiCell(index) => write!(f, "AOI cell #{index}"),
        }
    }
}

/// A record that failed validation. The batch carries on without it.
#[derive(Debug)]
pub struct RecordError {
    pub id: RecordId,
    pub error: SoilError,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.error)
    }
}
