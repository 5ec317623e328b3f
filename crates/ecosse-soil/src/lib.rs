//! Soil input preparation for the Ecosse soil/crop model: simplifies HWSD
//! soil groups and area-of-interest grid cells, then joins them into rows.

pub mod aoi;
pub mod bbox;
pub mod config;
pub mod error;
pub mod export;
pub mod record;
pub mod soil;

pub use aoi::{parse_aoi_cells, simplify_aoi_cell, simplify_aoi_cells, AoiCell, AoiSimplification};
pub use bbox::BoundingBox;
pub use config::{PrepConfig, SimplifyConfig, StudyDefn};
pub use error::{RecordError, RecordId, Result, SoilError};
pub use export::{join_rows, write_outputs, JoinResult, SoilRow};
pub use record::{MuGlobal, RecordShape, SoilLayout, SoilRecord};
pub use soil::{simplify_soil_group, simplify_soil_groups, GroupOutcome, SimplifyStats, SoilSimplification};
