use serde::{Deserialize, Serialize};

use super::Timestamp;
use crate::Vec3;

/// One inertial reading in the tracker body frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub stamp: Timestamp,
    /// Specific force (m/s²).
    pub accel: Vec3,
    /// Angular rate (rad/s).
    pub gyro: Vec3,
}

/// Per-axis bias and scale correction of a tracker IMU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuCalibration {
    pub acc_bias: Vec3,
    pub acc_scale: Vec3,
    pub gyr_bias: Vec3,
    pub gyr_scale: Vec3,
}

impl Default for ImuCalibration {
    fn default() -> Self {
        Self {
            acc_bias: Vec3::zeros(),
            acc_scale: Vec3::repeat(1.0),
            gyr_bias: Vec3::zeros(),
            gyr_scale: Vec3::repeat(1.0),
        }
    }
}

impl ImuCalibration {
    /// Apply `(value - bias) * scale` per axis.
    pub fn correct(&self, sample: &ImuSample) -> ImuSample {
        ImuSample {
            stamp: sample.stamp,
            accel: (sample.accel - self.acc_bias).component_mul(&self.acc_scale),
            gyro: (sample.gyro - self.gyr_bias).component_mul(&self.gyr_scale),
        }
    }
}
