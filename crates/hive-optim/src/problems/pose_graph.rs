//! Sliding-window fusion of sweep angles and inertial motion.
//!
//! Window states map to a pose block `pose/{k}` and a velocity block
//! `vel/{k}`. States built from light keep their batch and contribute sweep
//! residuals; consecutive states are tied by an inertial smoothing residual
//! built from the preintegrated IMU samples between them. Velocity blocks
//! exist only while smoothing residuals do. The oldest state is
//! pulled toward its previous estimate by a first-pose prior so the window
//! cannot drift as a whole.

use anyhow::{ensure, Result};
use hive_core::{ObservationBatch, Timestamp, Vec3};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::backend::solve_with_backend;
use crate::factors::inertial::Preintegration;
use crate::ir::{FactorKind, FixedMask, ParamId, ProblemIR, ResidualBlock, RobustLoss};
use crate::params::{PoseParams, VelocityParams};
use crate::problems::{SolverOptions, SweepModel};

/// Weights of the window problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseGraphOptions {
    /// Balance of inertial smoothing against sweep residuals.
    pub trust: f64,
    /// Base weight of the smoothing residual, multiplied by `trust`.
    pub smoothing: f64,
    /// Extra weight of the rotational part of the smoothing residual.
    pub rotation_factor: f64,
    /// Weight of the prior on the oldest state; zero disables it.
    pub first_factor: f64,
    /// Gravity in the reference frame (m/s²).
    pub gravity: [f64; 3],
}

impl Default for PoseGraphOptions {
    fn default() -> Self {
        Self {
            trust: 1.0,
            smoothing: 0.1,
            rotation_factor: 1.0,
            first_factor: 1.0,
            gravity: [0.0, 0.0, -9.80665],
        }
    }
}

impl PoseGraphOptions {
    pub fn gravity(&self) -> Vec3 {
        Vec3::from(self.gravity)
    }
}

/// One state of the window as seen by the problem builder.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    /// End of the span this state covers.
    pub stamp: Timestamp,
    pub pose: PoseParams,
    pub velocity: VelocityParams,
    /// Light batch backing this state, `None` for inertial states.
    pub batch: Option<ObservationBatch>,
    /// Inertial motion since the previous state.
    pub motion: Preintegration,
}

impl WindowState {
    pub fn is_light(&self) -> bool {
        self.batch.is_some()
    }
}

/// Solved window.
#[derive(Debug, Clone)]
pub struct PoseGraphResult {
    pub poses: Vec<PoseParams>,
    pub velocities: Vec<VelocityParams>,
    pub final_cost: f64,
    /// Number of sweep residuals in the window.
    pub sweep_residuals: usize,
    pub budget_exhausted: bool,
}

fn pose_key(k: usize) -> String {
    format!("pose/{k}")
}

fn vel_key(k: usize) -> String {
    format!("vel/{k}")
}

/// Build the window IR.
///
/// `anchor` is the previous estimate of the oldest state. Velocities are held
/// fixed when no state carries inertial motion, since sweeps alone cannot
/// observe them.
pub fn build_pose_graph_ir(
    states: &[WindowState],
    anchor: Option<&PoseParams>,
    model: &SweepModel<'_>,
    solver: &SolverOptions,
    opts: &PoseGraphOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
    ensure!(!states.is_empty(), "window is empty");
    let model = model.with_motor_correction(solver.use_motor_correction);
    let inertial = states.iter().skip(1).any(|s| s.motion.dt > 0.0);
    let vel_mask = || {
        if inertial {
            FixedMask::all_free()
        } else {
            FixedMask::all_fixed(VelocityParams::DIM)
        }
    };

    let weight = opts.trust * opts.smoothing;
    let smoothing = weight > 0.0 && states.len() > 1;
    let prior = anchor.filter(|_| opts.first_factor > 0.0);

    // A state only gets blocks when some residual reads them; the others keep
    // their current values.
    let mut ir = ProblemIR::new();
    let mut initial_map = HashMap::new();
    let mut ids: Vec<Option<(ParamId, Option<ParamId>)>> = Vec::with_capacity(states.len());
    for (k, state) in states.iter().enumerate() {
        ensure!(state.pose.is_finite(), "window pose {k} is not finite");
        if !(smoothing || state.is_light() || (k == 0 && prior.is_some())) {
            ids.push(None);
            continue;
        }
        let pose_id = ir.add_param_block(pose_key(k), PoseParams::DIM, FixedMask::all_free());
        initial_map.insert(pose_key(k), state.pose.to_dvec());
        let vel_id = smoothing.then(|| {
            initial_map.insert(vel_key(k), state.velocity.to_dvec());
            ir.add_param_block(vel_key(k), VelocityParams::DIM, vel_mask())
        });
        ids.push(Some((pose_id, vel_id)));

        if let Some(batch) = &state.batch {
            model.add_residuals(&mut ir, pose_id, batch, solver.robust_loss);
        }
    }

    if smoothing {
        let gravity = opts.gravity();
        for (k, state) in states.iter().enumerate().skip(1) {
            let (Some((pose_i, Some(vel_i))), Some((pose_j, Some(vel_j)))) = (ids[k - 1], ids[k])
            else {
                continue;
            };
            ir.add_residual_block(ResidualBlock::new(
                vec![pose_i, vel_i, pose_j, vel_j],
                RobustLoss::None,
                state.motion.to_factor(&gravity, weight, opts.rotation_factor),
            ));
        }
    }

    if let (Some(anchor), Some(Some((first, _)))) = (prior, ids.first()) {
        ir.add_residual_block(ResidualBlock::new(
            vec![*first],
            RobustLoss::None,
            FactorKind::PosePrior {
                anchor: anchor.to_array(),
                weight: opts.first_factor,
            },
        ));
    }

    Ok((ir, initial_map))
}

/// Jointly solve every state of the window.
///
/// Fails when the window holds no sweep residual, which callers treat as a
/// no-op.
pub fn optimize_pose_graph(
    states: &[WindowState],
    anchor: Option<&PoseParams>,
    model: &SweepModel<'_>,
    solver: &SolverOptions,
    opts: &PoseGraphOptions,
) -> Result<PoseGraphResult> {
    let (ir, initial_map) = build_pose_graph_ir(states, anchor, model, solver, opts)?;
    let sweep_residuals = ir.sweep_residual_count();
    ensure!(sweep_residuals > 0, "window holds no sweep residuals");

    let solution = solve_with_backend(&ir, &initial_map, &solver.backend_options())?;
    let mut poses = Vec::with_capacity(states.len());
    let mut velocities = Vec::with_capacity(states.len());
    for (k, state) in states.iter().enumerate() {
        poses.push(match solution.params.get(&pose_key(k)) {
            Some(v) => PoseParams::from_dvec(v.as_view())?,
            None => state.pose,
        });
        velocities.push(match solution.params.get(&vel_key(k)) {
            Some(v) => VelocityParams::from_dvec(v.as_view())?,
            None => state.velocity,
        });
    }
    debug!(
        "window solve: {} states, {} sweep residuals, cost {:.3e} -> {:.3e}",
        states.len(),
        sweep_residuals,
        solution.initial_cost,
        solution.final_cost
    );
    Ok(PoseGraphResult {
        poses,
        velocities,
        final_cost: solution.final_cost,
        sweep_residuals,
        budget_exhausted: solution.budget_exhausted,
    })
}
