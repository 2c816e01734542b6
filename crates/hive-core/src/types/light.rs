use serde::{Deserialize, Serialize};

use super::{Axis, SensorId, Timestamp};

/// One sweep hit reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSample {
    /// Sensor index, negative when the driver could not attribute the hit.
    pub sensor: i32,
    /// Sweep angle in radians.
    pub angle: f64,
    #[serde(default)]
    pub timecode: u32,
    #[serde(default)]
    pub length: u16,
}

impl LightSample {
    pub fn new(sensor: i32, angle: f64) -> Self {
        Self {
            sensor,
            angle,
            timecode: 0,
            length: 0,
        }
    }

    /// Sensor id, or `None` for the driver's "no sensor" marker.
    pub fn sensor_id(&self) -> Option<SensorId> {
        SensorId::try_from(self.sensor).ok()
    }
}

/// A batch of samples from one sweep of one lighthouse axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightMeasurement {
    pub lighthouse: String,
    pub axis: Axis,
    pub stamp: Timestamp,
    pub samples: Vec<LightSample>,
}

/// Fresh sweeps gathered for one solve, possibly from several lighthouses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservationBatch {
    /// Stamp of the newest sweep in the batch.
    pub stamp: Timestamp,
    pub sweeps: Vec<LightMeasurement>,
}

impl ObservationBatch {
    pub fn new(stamp: Timestamp, sweeps: Vec<LightMeasurement>) -> Self {
        Self { stamp, sweeps }
    }

    /// Batch stamped with the newest sweep.
    pub fn from_sweeps(sweeps: Vec<LightMeasurement>) -> Self {
        let stamp = sweeps.iter().map(|s| s.stamp).max().unwrap_or_default();
        Self { stamp, sweeps }
    }

    /// Total number of samples across all sweeps.
    pub fn sample_count(&self) -> usize {
        self.sweeps.iter().map(|s| s.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }
}
