use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::ImuCalibration;
use crate::{error::SetupError, Vec3};

/// Photodiode index on a tracker.
pub type SensorId = u16;

/// Highest number of photodiodes a tracker may carry.
pub const MAX_SENSORS: usize = 32;

/// Effective photodiode radius used when no calibration value is available.
pub const DEFAULT_PHOTODIODE_RADIUS: f64 = 0.005;

/// A photodiode on the tracker body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    /// Position in the tracker body frame (meters).
    pub position: Vec3,
    /// Unit normal in the tracker body frame.
    pub normal: Vec3,
}

/// Calibration record of one tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackerRecord")]
pub struct Tracker {
    pub serial: String,
    pub sensors: BTreeMap<SensorId, Sensor>,
    pub imu: ImuCalibration,
    pub radius: f64,
}

fn default_radius() -> f64 {
    DEFAULT_PHOTODIODE_RADIUS
}

/// Serialized form of [`Tracker`]; sensor entries are kept in file order so
/// repeated ids can be reported.
#[derive(Debug, Deserialize)]
struct TrackerRecord {
    serial: String,
    #[serde(deserialize_with = "sensor_entries")]
    sensors: Vec<(SensorId, Sensor)>,
    #[serde(default)]
    imu: ImuCalibration,
    #[serde(default = "default_radius")]
    radius: f64,
}

fn sensor_entries<'de, D>(deserializer: D) -> Result<Vec<(SensorId, Sensor)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Entries;

    impl<'de> Visitor<'de> for Entries {
        type Value = Vec<(SensorId, Sensor)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of sensors keyed by id")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(Entries)
}

fn unique_sensors(
    entries: impl IntoIterator<Item = (SensorId, Sensor)>,
) -> Result<BTreeMap<SensorId, Sensor>, SetupError> {
    let mut sensors = BTreeMap::new();
    for (id, sensor) in entries {
        if sensors.insert(id, sensor).is_some() {
            return Err(SetupError::DuplicateSensor { id });
        }
    }
    Ok(sensors)
}

impl TryFrom<TrackerRecord> for Tracker {
    type Error = SetupError;

    fn try_from(record: TrackerRecord) -> Result<Self, SetupError> {
        Ok(Self {
            serial: record.serial,
            sensors: unique_sensors(record.sensors)?,
            imu: record.imu,
            radius: record.radius,
        })
    }
}

impl Tracker {
    /// Tracker with default IMU calibration; fails on a repeated sensor id.
    pub fn try_new(
        serial: impl Into<String>,
        sensors: impl IntoIterator<Item = Sensor>,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            serial: serial.into(),
            sensors: unique_sensors(sensors.into_iter().map(|s| (s.id, s)))?,
            imu: ImuCalibration::default(),
            radius: DEFAULT_PHOTODIODE_RADIUS,
        })
    }

    /// Parse and validate a tracker record from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SetupError> {
        let record: TrackerRecord =
            serde_json::from_str(json).map_err(|e| SetupError::Record(e.to_string()))?;
        let tracker = Tracker::try_from(record)?;
        Extrinsics::from_tracker(&tracker)?;
        Ok(tracker)
    }
}

/// Read-only sensor layout handed to the solvers.
///
/// Built once from the tracker's sensor map; slots are indexed by sensor id
/// and hold `None` where the tracker has no photodiode.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrinsics {
    positions: Vec<Option<Vec3>>,
    normals: Vec<Option<Vec3>>,
    count: usize,
    radius: f64,
}

impl Extrinsics {
    /// Validate the sensor map and flatten it.
    pub fn from_tracker(tracker: &Tracker) -> Result<Self, SetupError> {
        if tracker.sensors.is_empty() {
            return Err(SetupError::EmptySensorMap {
                serial: tracker.serial.clone(),
            });
        }
        let mut positions = vec![None; MAX_SENSORS];
        let mut normals = vec![None; MAX_SENSORS];
        for (&id, sensor) in &tracker.sensors {
            let slot = id as usize;
            if slot >= MAX_SENSORS || sensor.id != id {
                return Err(SetupError::SensorOutOfRange { id });
            }
            let finite = sensor.position.iter().chain(sensor.normal.iter()).all(|v| v.is_finite());
            if !finite {
                return Err(SetupError::NonFiniteSensor { id });
            }
            positions[slot] = Some(sensor.position);
            normals[slot] = Some(sensor.normal);
        }
        Ok(Self {
            positions,
            normals,
            count: tracker.sensors.len(),
            radius: tracker.radius,
        })
    }

    /// Position of sensor `id`, `None` if the tracker has no such sensor.
    pub fn position(&self, id: SensorId) -> Option<&Vec3> {
        self.positions.get(id as usize).and_then(|p| p.as_ref())
    }

    pub fn normal(&self, id: SensorId) -> Option<&Vec3> {
        self.normals.get(id as usize).and_then(|n| n.as_ref())
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.position(id).is_some()
    }

    /// Number of populated sensors.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}
