//! Storage module for harvested records
//!
//! This module handles everything that touches the file system:
//! - Appending rows to the active CSV log
//! - Monthly rotation into per-month archives
//! - Month arithmetic for the rotation state
//! - The optional checkpoint file

mod checkpoint;
mod csv_log;
mod period;
mod rotation;

pub use checkpoint::Checkpoint;
pub use csv_log::CsvLog;
pub use period::{zone_from_hours, Period, RotationState};
pub use rotation::{backup_path, natural_cmp, RotationReport, Rotator, BACKUP_SUFFIX};
