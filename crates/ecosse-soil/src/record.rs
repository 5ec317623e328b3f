//! Soil metric records and their fixed shapes.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoilError};

/// HWSD mapping-unit identifier.
pub type MuGlobal = i32;

/// Metrics per soil layer: organic carbon, bulk density, pH, sand, silt, clay.
pub const METRICS_PER_LAYER: usize = 6;

/// Written in place of sub-layer metrics a record does not carry.
pub const NO_DATA: f64 = -999.0;

/// Metric values of one sub-soil followed by its share (0-100 % of the
/// mapping unit's area).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoilRecord(Vec<f64>);

impl SoilRecord {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Build a record from metric values and a share.
    pub fn from_parts(metrics: &[f64], share: f64) -> Self {
        let mut values = Vec::with_capacity(metrics.len() + 1);
        values.extend_from_slice(metrics);
        values.push(share);
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Every field except the trailing share.
    pub fn metrics(&self) -> &[f64] {
        match self.0.split_last() {
            Some((_, metrics)) => metrics,
            None => &[],
        }
    }

    pub fn share(&self) -> f64 {
        self.0.last().copied().unwrap_or(0.0)
    }

    pub fn set_share(&mut self, share: f64) {
        match self.0.last_mut() {
            Some(last) => *last = share,
            None => self.0.push(share),
        }
    }

    pub fn with_share(mut self, share: f64) -> Self {
        self.set_share(share);
        self
    }

    /// Lexicographic order over all fields, share included. `-0.0` and `0.0`
    /// compare equal so they sort alongside each other; NaN falls back to
    /// `f64::total_cmp`.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

/// Fixed number of metric fields every record in a batch must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordShape {
    pub n_metrics: usize,
}

impl RecordShape {
    pub fn new(n_metrics: usize) -> Self {
        Self { n_metrics }
    }

    /// Metrics plus the trailing share.
    pub fn record_len(&self) -> usize {
        self.n_metrics + 1
    }

    pub fn check(&self, key: MuGlobal, record: &SoilRecord) -> Result<()> {
        if record.len() != self.record_len() {
            return Err(SoilError::MalformedRecord {
                key,
                expected: self.record_len(),
                found: record.len(),
            });
        }
        Ok(())
    }
}

impl Default for RecordShape {
    fn default() -> Self {
        SoilLayout::default().shape()
    }
}

/// Soil layers present in exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilLayout {
    /// Topsoil (0-30 cm) only; sub-layer columns export as [`NO_DATA`].
    #[default]
    TopOnly,
    /// Topsoil plus subsoil (30-100 cm).
    TopAndSub,
}

impl SoilLayout {
    pub fn n_layers(self) -> usize {
        match self {
            SoilLayout::TopOnly => 1,
            SoilLayout::TopAndSub => 2,
        }
    }

    pub fn shape(self) -> RecordShape {
        RecordShape::new(self.n_layers() * METRICS_PER_LAYER)
    }
}
