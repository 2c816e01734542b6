//! Estimator configuration.
//!
//! Every threshold is a plain serde field with an empirically chosen default,
//! so a JSON file only needs the values that differ.

use anyhow::{Context, Result};
use hive_linear::HandEyeOptions;
use hive_optim::{OffsetRefineOptions, PoseGraphOptions, RobustLoss, SolverOptions};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_3;
use std::path::Path;
use std::time::Duration;

/// Ingestion rules of the observation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Axis data at least this old relative to the newest sweep is discarded.
    pub staleness: Duration,
    /// A lighthouse is solvable once both axes hold more samples than this.
    pub min_samples_per_axis: usize,
    /// Samples with a larger absolute angle (radians) are dropped.
    pub max_abs_angle: f64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::from_millis(50),
            min_samples_per_axis: 3,
            max_abs_angle: FRAC_PI_3,
        }
    }
}

/// Window and weights of the pose-graph solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseGraphConfig {
    /// Largest number of states kept in the window.
    pub window: usize,
    /// Apply rotor calibration in window solves.
    pub correction: bool,
    #[serde(flatten)]
    pub weights: PoseGraphOptions,
}

impl Default for PoseGraphConfig {
    fn default() -> Self {
        Self {
            window: 10,
            correction: false,
            weights: PoseGraphOptions::default(),
        }
    }
}

/// Frame-alignment calibrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetConfig {
    /// Weight of rotation against translation in the refinement.
    pub angle_factor: f64,
    /// Also produce a refined candidate.
    pub refine: bool,
    /// Average buffered poses and pair them only on `next_pose`.
    pub steps: bool,
    /// Minimum motion (meters) between accepted pairs in continuous mode.
    pub distance_thresh: f64,
    /// Minimum rotation (radians) between accepted pairs in continuous mode.
    pub angle_thresh: f64,
    /// Largest stamp difference of a tracked/reference pair.
    pub time_thresh: Duration,
    /// Cauchy scale of the refinement.
    pub cauchy: f64,
    pub max_iters: usize,
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            angle_factor: 1.0,
            refine: true,
            steps: false,
            distance_thresh: 0.05,
            angle_thresh: 0.1,
            time_thresh: Duration::from_millis(10),
            cauchy: 0.05,
            max_iters: 500,
        }
    }
}

impl OffsetConfig {
    pub fn refine_options(&self) -> OffsetRefineOptions {
        OffsetRefineOptions {
            angle_factor: self.angle_factor,
            robust_loss: RobustLoss::Cauchy { scale: self.cauchy },
            max_iters: self.max_iters,
            fix_body: false,
        }
    }

    pub fn handeye_options(&self) -> HandEyeOptions {
        HandEyeOptions::default()
    }
}

/// Complete configuration of one tracker's estimators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub observations: ObservationConfig,
    pub solver: SolverOptions,
    pub pose_graph: PoseGraphConfig,
    pub offset: OffsetConfig,
}

impl EstimatorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse estimator config")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize estimator config")
    }
}
