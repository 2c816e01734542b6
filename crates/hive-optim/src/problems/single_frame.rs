//! Single-frame tracker pose from one batch of sweep angles.
//!
//! Builds one residual per sample against every lighthouse in the batch and
//! solves only for the 6 tracker-pose parameters. Lighthouse poses, sensor
//! positions and rotor calibrations stay constant. The solve runs under a
//! wall-clock budget and the result goes through [`ValidityThresholds`]
//! before the caller's pose is touched.

use anyhow::{anyhow, ensure, Result};
use hive_core::{ObservationBatch, SolvedPose};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::backend::{solve_with_backend, BackendSolveOptions};
use crate::ir::{FixedMask, ProblemIR, RobustLoss};
use crate::params::PoseParams;
use crate::problems::SweepModel;
use crate::validity::{Rejection, ValidityThresholds};

const POSE_KEY: &str = "pose";

/// Solve options for the single-frame problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Wall-clock budget of one solve.
    pub time_budget: Duration,
    pub max_iters: usize,
    /// Robust loss applied to every sweep residual.
    pub robust_loss: RobustLoss,
    pub use_motor_correction: bool,
    /// Start pose `[tx, ty, tz, rx, ry, rz]` used before any valid pose exists.
    pub start_pose: [f64; 6],
    pub validity: ValidityThresholds,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(1),
            max_iters: 100,
            robust_loss: RobustLoss::Cauchy { scale: 0.01 },
            use_motor_correction: false,
            start_pose: SolvedPose::canonical().params(),
            validity: ValidityThresholds::default(),
        }
    }
}

impl SolverOptions {
    pub(crate) fn backend_options(&self) -> BackendSolveOptions {
        BackendSolveOptions {
            max_iters: self.max_iters,
            time_budget: Some(self.time_budget),
            ..Default::default()
        }
    }
}

/// Accepted single-frame solution.
#[derive(Debug, Clone, Copy)]
pub struct SingleFrameResult {
    pub pose: PoseParams,
    pub final_cost: f64,
    /// Number of sweep residuals in the problem.
    pub residuals: usize,
    pub budget_exhausted: bool,
}

/// Build the IR of a single-frame solve seeded at `initial`.
pub fn build_single_frame_ir(
    batch: &ObservationBatch,
    model: &SweepModel<'_>,
    initial: &PoseParams,
    opts: &SolverOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
    ensure!(initial.is_finite(), "initial pose is not finite");
    let mut ir = ProblemIR::new();
    let pose_id = ir.add_param_block(POSE_KEY, PoseParams::DIM, FixedMask::all_free());
    let model = model.with_motor_correction(opts.use_motor_correction);
    model.add_residuals(&mut ir, pose_id, batch, opts.robust_loss);

    let mut initial_map = HashMap::new();
    initial_map.insert(POSE_KEY.to_string(), initial.to_dvec());
    Ok((ir, initial_map))
}

/// Run the solve without applying the validity rules.
pub fn optimize_single_frame(
    batch: &ObservationBatch,
    model: &SweepModel<'_>,
    initial: &PoseParams,
    opts: &SolverOptions,
) -> Result<SingleFrameResult> {
    let (ir, initial_map) = build_single_frame_ir(batch, model, initial, opts)?;
    let residuals = ir.sweep_residual_count();
    if residuals == 0 {
        return Err(Rejection::NoResiduals.into());
    }
    let solution = solve_with_backend(&ir, &initial_map, &opts.backend_options())?;
    let solved = solution
        .params
        .get(POSE_KEY)
        .ok_or_else(|| anyhow!("solution is missing the {POSE_KEY} block"))?;
    let pose = PoseParams::from_dvec(solved.as_view())?;
    debug!(
        "single-frame solve: {} residuals, cost {:.3e} -> {:.3e}",
        residuals, solution.initial_cost, solution.final_cost
    );
    Ok(SingleFrameResult {
        pose,
        final_cost: solution.final_cost,
        residuals,
        budget_exhausted: solution.budget_exhausted,
    })
}

/// Solve for `pose` from `batch`, starting at its current value.
///
/// On success the rotation is renormalized into `(-π, π]`, the pose is marked
/// valid and stamped with the batch time. On failure `pose` is left untouched;
/// rejections by the validity rules are returned as a [`Rejection`] inside the
/// error.
pub fn solve_single_frame(
    pose: &mut SolvedPose,
    batch: &ObservationBatch,
    model: &SweepModel<'_>,
    opts: &SolverOptions,
) -> Result<SingleFrameResult> {
    let initial = PoseParams::from(&*pose);
    let result = optimize_single_frame(batch, model, &initial, opts)?;
    opts.validity
        .check(&result.pose, result.final_cost, result.residuals)?;

    pose.translation = result.pose.translation;
    pose.rotation = result.pose.rotation;
    pose.renormalize();
    pose.valid = true;
    pose.stamp = batch.stamp;
    Ok(result)
}
