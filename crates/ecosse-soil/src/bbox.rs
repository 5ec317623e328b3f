//! Area-of-interest bounding box in geographic degrees.
//! All coordinate math uses f64.

use serde::{Deserialize, Serialize};

use crate::aoi::AoiCell;
use crate::error::{Result, SoilError};

/// Mean Earth radius in kilometres (IUGG).
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Lower-left / upper-right corners, serialised as `[ll_lon, ll_lat, ur_lon, ur_lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub ll_lon: f64,
    pub ll_lat: f64,
    pub ur_lon: f64,
    pub ur_lat: f64,
}

impl BoundingBox {
    pub fn new(ll_lon: f64, ll_lat: f64, ur_lon: f64, ur_lat: f64) -> Self {
        Self { ll_lon, ll_lat, ur_lon, ur_lat }
    }

    pub fn validate(&self) -> Result<()> {
        let reason = if !(-180.0..=180.0).contains(&self.ll_lon) || !(-180.0..=180.0).contains(&self.ur_lon) {
            Some("longitude outside [-180, 180]")
        } else if !(-90.0..=90.0).contains(&self.ll_lat) || !(-90.0..=90.0).contains(&self.ur_lat) {
            Some("latitude outside [-90, 90]")
        } else if self.ll_lon >= self.ur_lon || self.ll_lat >= self.ur_lat {
            Some("lower-left corner must lie south-west of upper-right")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SoilError::InvalidBoundingBox {
                ll_lon: self.ll_lon,
                ll_lat: self.ll_lat,
                ur_lon: self.ur_lon,
                ur_lat: self.ur_lat,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.ll_lat && lat <= self.ur_lat && lon >= self.ll_lon && lon <= self.ur_lon
    }

    /// Surface area on a spherical Earth, km².
    pub fn area_km2(&self) -> f64 {
        let d_lon = (self.ur_lon - self.ll_lon).to_radians();
        let band = self.ur_lat.to_radians().sin() - self.ll_lat.to_radians().sin();
        EARTH_RADIUS_KM * EARTH_RADIUS_KM * d_lon * band
    }

    /// Keep the cells whose centre falls inside the box.
    pub fn filter_cells(&self, cells: Vec<AoiCell>) -> Vec<AoiCell> {
        cells.into_iter().filter(|c| self.contains(c.lat, c.lon)).collect()
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(116.90045, 28.2294, 117.0, 29.0)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([ll_lon, ll_lat, ur_lon, ur_lat]: [f64; 4]) -> Self {
        Self::new(ll_lon, ll_lat, ur_lon, ur_lat)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.ll_lon, b.ll_lat, b.ur_lon, b.ur_lat]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn whole_globe_area_matches_sphere() {
        let globe = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        let sphere = 4.0 * std::f64::consts::PI * EARTH_RADIUS_KM * EARTH_RADIUS_KM;
        assert_relative_eq!(globe.area_km2(), sphere, max_relative = 1e-12);
    }

    #[test]
    fn one_degree_at_equator() {
        let cell = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        // ~111.2 km × ~111.2 km
        assert_relative_eq!(cell.area_km2(), 12363.0, max_relative = 1e-3);
    }

    #[test]
    fn inverted_box_is_rejected() {
        assert!(BoundingBox::default().validate().is_ok());
        let inverted = BoundingBox::new(10.0, 50.0, 5.0, 55.0);
        assert!(matches!(inverted.validate(), Err(SoilError::InvalidBoundingBox { .. })));
        let off_globe = BoundingBox::new(0.0, 0.0, 1.0, 95.0);
        assert!(off_globe.validate().is_err());
    }

    #[test]
    fn contains_is_edge_inclusive() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(b.contains(0.0, 1.0));
        assert!(b.contains(0.5, 0.5));
        assert!(!b.contains(1.01, 0.5));
    }

    #[test]
    fn serialises_as_corner_array() {
        let json = serde_json::to_string(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ur_lat, 4.0);
    }
}
