//! Run configuration: the simplifier knobs plus the study settings the
//! export step needs. Persisted as pretty-printed JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bbox::BoundingBox;
use crate::error::{Result, SoilError};
use crate::record::{RecordShape, SoilLayout};

/// Parameters passed into both simplifiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifyConfig {
    /// Collapse multi-soil mapping units to their dominant soil.
    pub use_dominant_soil: bool,
    pub shape: RecordShape,
}

impl SimplifyConfig {
    pub fn new(use_dominant_soil: bool, shape: RecordShape) -> Self {
        Self { use_dominant_soil, shape }
    }
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            use_dominant_soil: true,
            shape: RecordShape::default(),
        }
    }
}

/// File name suffix of the study definition written beside the outputs.
pub const STUDY_DEFN_SUFFIX: &str = "_study_definition.txt";

/// Study summary consumed by downstream Ecosse run tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDefn {
    pub study: String,
    pub bbox: BoundingBox,
    pub area_km2: f64,
    pub use_dominant_soil: bool,
    pub layout: SoilLayout,
}

#[derive(Serialize, Deserialize)]
struct StudyDefnFile {
    #[serde(rename = "studyDefn")]
    study_defn: StudyDefn,
}

/// Study-level settings read by the `soil_prep` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub study: String,
    pub bbox: BoundingBox,
    pub use_dominant_soil: bool,
    pub layout: SoilLayout,
    /// Also dump cells whose mapping unit is 0 (sea / no soil).
    pub zeros_file: bool,
    pub output_dir: PathBuf,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            study: String::new(),
            bbox: BoundingBox::default(),
            use_dominant_soil: true,
            layout: SoilLayout::default(),
            zeros_file: false,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PrepConfig {
    /// Read `path`, or write the defaults there and return them if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = fs::read_to_string(path)?;
            let config: PrepConfig = serde_json::from_str(&text)
                .map_err(|e| SoilError::Config(format!("{}: {e}", path.display())))?;
            config.bbox.validate()?;
            info!(path = %path.display(), study = %config.study, "read config file");
            Ok(config)
        } else {
            let config = PrepConfig::default();
            config.save(path)?;
            info!(path = %path.display(), "wrote default config file");
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn simplify_config(&self) -> SimplifyConfig {
        SimplifyConfig::new(self.use_dominant_soil, self.layout.shape())
    }

    pub fn study_defn(&self) -> StudyDefn {
        StudyDefn {
            study: self.study.clone(),
            bbox: self.bbox,
            area_km2: self.bbox.area_km2(),
            use_dominant_soil: self.use_dominant_soil,
            layout: self.layout,
        }
    }

    /// Write `<study>_study_definition.txt` into `dir`. Nothing is written
    /// when the study is unnamed.
    pub fn write_study_definition(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.study.trim().is_empty() {
            warn!("study not defined, could not write study definition file");
            return Ok(None);
        }
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}{STUDY_DEFN_SUFFIX}", self.study.trim()));
        let file = StudyDefnFile { study_defn: self.study_defn() };
        fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        Ok(Some(path))
    }
}
