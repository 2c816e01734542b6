//! Nonlinear refinement of the tracking-to-reference frame offset.
//!
//! Both `frame` and `body` are free 6D blocks; every tracked/reference pair
//! contributes one [`FactorKind::FrameAlignment`] residual under a Cauchy
//! loss. The refined transform replaces the seed only when it does not
//! increase the cost.

use anyhow::{anyhow, ensure, Result};
use hive_core::{iso_to_array7, Iso3, OffsetMethod, OffsetTransform};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::backend::{evaluate_cost, solve_with_backend, BackendSolveOptions};
use crate::ir::{FactorKind, FixedMask, ProblemIR, ResidualBlock, RobustLoss};
use crate::params::PoseParams;

const FRAME_KEY: &str = "frame";
const BODY_KEY: &str = "body";

/// Options of the offset refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetRefineOptions {
    /// Weight of rotational residuals relative to translational ones.
    pub angle_factor: f64,
    pub robust_loss: RobustLoss,
    pub max_iters: usize,
    /// Keep `body` at its seed value.
    pub fix_body: bool,
}

impl Default for OffsetRefineOptions {
    fn default() -> Self {
        Self {
            angle_factor: 1.0,
            robust_loss: RobustLoss::Cauchy { scale: 0.05 },
            max_iters: 500,
            fix_body: false,
        }
    }
}

/// Build the IR of the refinement seeded at `seed`.
pub fn build_offset_ir(
    tracked: &[Iso3],
    reference: &[Iso3],
    seed: &OffsetTransform,
    opts: &OffsetRefineOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
    ensure!(
        tracked.len() == reference.len(),
        "tracked/reference count mismatch: {} vs {}",
        tracked.len(),
        reference.len()
    );
    ensure!(!tracked.is_empty(), "need at least one pose pair");

    let mut ir = ProblemIR::new();
    let frame_id = ir.add_param_block(FRAME_KEY, PoseParams::DIM, FixedMask::all_free());
    let body_mask = if opts.fix_body {
        FixedMask::all_fixed(PoseParams::DIM)
    } else {
        FixedMask::all_free()
    };
    let body_id = ir.add_param_block(BODY_KEY, PoseParams::DIM, body_mask);

    for (t, r) in tracked.iter().zip(reference) {
        ir.add_residual_block(ResidualBlock::new(
            vec![frame_id, body_id],
            opts.robust_loss,
            FactorKind::FrameAlignment {
                tracked: iso_to_array7(t),
                reference: iso_to_array7(r),
                angle_factor: opts.angle_factor,
            },
        ));
    }

    let mut initial_map = HashMap::new();
    initial_map.insert(FRAME_KEY.to_string(), PoseParams::from_iso(&seed.frame).to_dvec());
    initial_map.insert(BODY_KEY.to_string(), PoseParams::from_iso(&seed.body).to_dvec());
    Ok((ir, initial_map))
}

/// Robustified alignment cost of `offset` over the pose pairs.
pub fn offset_cost(
    tracked: &[Iso3],
    reference: &[Iso3],
    offset: &OffsetTransform,
    opts: &OffsetRefineOptions,
) -> Result<f64> {
    let (ir, params) = build_offset_ir(tracked, reference, offset, opts)?;
    evaluate_cost(&ir, &params)
}

/// Refine a closed-form offset.
///
/// Returns a [`OffsetMethod::Refined`] transform annotated with its cost. If
/// the optimizer fails or ends above the seed cost, the seed values are kept.
pub fn refine_offset(
    tracked: &[Iso3],
    reference: &[Iso3],
    seed: &OffsetTransform,
    opts: &OffsetRefineOptions,
) -> Result<OffsetTransform> {
    let (ir, initial_map) = build_offset_ir(tracked, reference, seed, opts)?;
    let seed_cost = evaluate_cost(&ir, &initial_map)?;
    let backend_opts = BackendSolveOptions {
        max_iters: opts.max_iters,
        ..Default::default()
    };
    let keep_seed = || OffsetTransform {
        method: OffsetMethod::Refined,
        cost: Some(seed_cost),
        ..seed.clone()
    };
    let solution = match solve_with_backend(&ir, &initial_map, &backend_opts) {
        Ok(solution) => solution,
        Err(err) => {
            debug!("offset refinement failed, keeping the seed: {err:#}");
            return Ok(keep_seed());
        }
    };
    debug!(
        "offset refinement: {} pairs, cost {:.3e} -> {:.3e}",
        tracked.len(),
        seed_cost,
        solution.final_cost
    );

    if solution.final_cost.is_nan() || solution.final_cost > seed_cost {
        debug!("offset refinement did not improve on the seed, keeping it");
        return Ok(keep_seed());
    }

    let block = |key: &str| {
        solution
            .params
            .get(key)
            .ok_or_else(|| anyhow!("solution is missing the {key} block"))
    };
    let frame = PoseParams::from_dvec(block(FRAME_KEY)?.as_view())?;
    let body = PoseParams::from_dvec(block(BODY_KEY)?.as_view())?;
    Ok(OffsetTransform {
        frame: frame.to_iso(),
        body: body.to_iso(),
        method: OffsetMethod::Refined,
        cost: Some(solution.final_cost),
    })
}
