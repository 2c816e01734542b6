//! High-level entry crate for lighthouse tracker pose estimation.
//!
//! A tracker is described by its photodiode layout; the room by the poses of
//! its lighthouses. Each lighthouse sweeps two laser planes across the room and
//! every sensor hit becomes one angle measurement. From these the crate
//! estimates the tracker pose in the room frame, either frame by frame or with
//! a sliding window that also fuses the tracker's IMU.
//!
//! ```no_run
//! use hive::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tracker = Tracker::from_json_str(&std::fs::read_to_string("tracker.json")?)?;
//! let environment: Environment = serde_json::from_str(&std::fs::read_to_string("room.json")?)?;
//! let config = EstimatorConfig::from_json_file("estimator.json")?;
//!
//! let solver = PoseGraph::new(&tracker, environment, LighthouseMap::new(), &config)?;
//! let context = TrackerContext::spawn(tracker.serial.clone(), solver)?;
//! # let sweeps: Vec<LightMeasurement> = Vec::new();
//! for sweep in sweeps {
//!     context.process_light(sweep)?;
//!     if let Some(pose) = context.get_transform() {
//!         println!("{} at {:?}: {:?}", pose.child_frame, pose.stamp, pose.translation);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The [`pipeline::HiveOffset`] calibrator aligns the tracking frame with an
//! external motion-capture system from paired poses of both.

/// Data model, sweep projection and rotation helpers.
pub mod core {
    pub use hive_core::*;
}

/// Closed-form frame alignment.
pub mod linear {
    pub use hive_linear::*;
}

/// Nonlinear least-squares problems and the solver backend.
pub mod optim {
    pub use hive_optim::*;
}

/// Stateful estimators, configuration and worker threads.
pub mod pipeline {
    pub use hive_pipeline::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use hive::prelude::*;`.
pub mod prelude {
    pub use crate::core::{
        Axis, Environment, ImuSample, Iso3, LightMeasurement, LightSample, Lighthouse,
        LighthouseMap, OffsetTransform, SolvedPose, Timestamp, TransformStamped, Tracker, Vec3,
    };
    pub use crate::pipeline::{
        BaseSolver, EstimatorConfig, HiveOffset, PoseGraph, PoseSolver, TrackerContext,
    };
}
