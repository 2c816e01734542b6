use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::SetupError, Iso3};

/// Sweep direction of a lighthouse rotor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];

    pub fn index(self) -> usize {
        match self {
            Axis::Horizontal => 0,
            Axis::Vertical => 1,
        }
    }
}

/// Per-axis rotor calibration of a lighthouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCalibration {
    pub phase: f64,
    pub tilt: f64,
    pub gib_phase: f64,
    pub gib_magnitude: f64,
    pub curve: f64,
}

impl MotorCalibration {
    pub fn is_finite(&self) -> bool {
        [self.phase, self.tilt, self.gib_phase, self.gib_magnitude, self.curve]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Parameters in the order `[phase, tilt, gib_phase, gib_magnitude, curve]`.
    pub fn to_array(&self) -> [f64; 5] {
        [self.phase, self.tilt, self.gib_phase, self.gib_magnitude, self.curve]
    }
}

/// Calibration record of one base station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighthouse {
    pub serial: String,
    pub id: u8,
    #[serde(default)]
    pub horizontal: MotorCalibration,
    #[serde(default)]
    pub vertical: MotorCalibration,
}

impl Lighthouse {
    pub fn new(serial: impl Into<String>, id: u8) -> Self {
        Self {
            serial: serial.into(),
            id,
            horizontal: MotorCalibration::default(),
            vertical: MotorCalibration::default(),
        }
    }

    pub fn motor(&self, axis: Axis) -> &MotorCalibration {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.horizontal.is_finite() && self.vertical.is_finite() {
            Ok(())
        } else {
            Err(SetupError::NonFiniteLighthouse {
                serial: self.serial.clone(),
            })
        }
    }
}

/// Reference frame and calibrated lighthouse placements.
///
/// Each pose maps lighthouse coordinates into the reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub frame: String,
    pub lighthouses: BTreeMap<String, Iso3>,
}

impl Environment {
    pub fn new(frame: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            lighthouses: BTreeMap::new(),
        }
    }

    pub fn with_lighthouse(mut self, serial: impl Into<String>, pose: Iso3) -> Self {
        self.lighthouses.insert(serial.into(), pose);
        self
    }

    /// Reference-frame pose of a lighthouse, if calibrated.
    pub fn lighthouse_pose(&self, serial: &str) -> Option<&Iso3> {
        self.lighthouses.get(serial)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.frame.is_empty() {
            return Err(SetupError::EmptyFrame);
        }
        for (serial, pose) in &self.lighthouses {
            let finite = pose.translation.vector.iter().all(|v| v.is_finite())
                && pose.rotation.coords.iter().all(|v| v.is_finite());
            if !finite {
                return Err(SetupError::NonFiniteLighthouse {
                    serial: serial.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Lighthouse calibration records keyed by serial.
pub type LighthouseMap = BTreeMap<String, Lighthouse>;
