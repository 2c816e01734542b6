use thiserror::Error;

use crate::types::{SensorId, MAX_SENSORS};

/// Structural errors raised while setting up a tracker or environment.
///
/// These are fatal for the affected instance and are kept apart from runtime
/// per-sample issues, which are dropped silently during ingestion.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("sensor id {id} is out of range (at most {max} sensors)", max = MAX_SENSORS)]
    SensorOutOfRange { id: SensorId },
    #[error("sensor id {id} appears more than once")]
    DuplicateSensor { id: SensorId },
    #[error("tracker {serial} has no sensors")]
    EmptySensorMap { serial: String },
    #[error("sensor {id} has a non-finite position or normal")]
    NonFiniteSensor { id: SensorId },
    #[error("lighthouse {serial} has a non-finite calibration value")]
    NonFiniteLighthouse { serial: String },
    #[error("environment frame name is empty")]
    EmptyFrame,
    #[error("invalid calibration record: {0}")]
    Record(String),
}
