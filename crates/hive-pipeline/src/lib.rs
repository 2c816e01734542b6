//! Stateful estimators for lighthouse trackers.
//!
//! - [`observations`]: latest sweep per lighthouse axis with staleness eviction,
//! - [`base_solver`]: one single-frame solve per complete batch,
//! - [`pose_graph`]: sliding window fusing light and inertial states,
//! - [`offset`]: alignment of the tracking frame with a reference system,
//! - [`worker`]: per-tracker thread driving any [`PoseSolver`],
//! - [`config`]: JSON-backed thresholds and weights for all of the above.

pub mod base_solver;
pub mod config;
pub mod observations;
pub mod offset;
pub mod pose_graph;
pub mod solver;
pub mod worker;

pub use base_solver::BaseSolver;
pub use config::{EstimatorConfig, ObservationConfig, OffsetConfig, PoseGraphConfig};
pub use observations::ObservationStore;
pub use offset::{estimate_offsets, HiveOffset, PoseSource};
pub use pose_graph::{PoseGraph, PoseWindow};
pub use solver::PoseSolver;
pub use worker::{TrackerContext, WorkerError};
