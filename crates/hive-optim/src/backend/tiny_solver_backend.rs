use crate::backend::{BackendSolution, BackendSolveOptions, LinearSolverKind, OptimBackend};
use crate::factors::alignment::{alignment_residual_generic, AlignmentData};
use crate::factors::inertial::{inertial_residual_generic, InertialData};
use crate::factors::prior::pose_prior_residual_generic;
use crate::factors::sweep::{sweep_residual_generic, SweepData};
use crate::ir::{FactorKind, ProblemIR, ResidualBlock, RobustLoss};
use anyhow::{anyhow, ensure, Result};
use log::{debug, warn};
use nalgebra::DVector;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{ArctanLoss, CauchyLoss, HuberLoss, Loss};
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// Iterations run between two wall-clock checks. Every burst restarts LM with
/// fresh damping, so bursts are kept long.
const ITERATIONS_PER_CHECK: usize = 25;

/// tiny-solver backend adapter.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

type ParamMap = HashMap<String, DVector<f64>>;

/// Put back the blocks `compile` left out of the problem.
fn restore_unreferenced(ir: &ProblemIR, initial: &ParamMap, params: &mut ParamMap) {
    for param in &ir.params {
        if let Some(init) = initial.get(&param.name) {
            params
                .entry(param.name.clone())
                .or_insert_with(|| init.clone());
        }
    }
}

impl TinySolverBackend {
    fn compile(&self, ir: &ProblemIR, initial: &ParamMap) -> Result<(Problem, ParamMap)> {
        ir.validate()?;
        ensure!(!ir.residuals.is_empty(), "problem has no residual blocks");

        let mut problem = Problem::new();
        let mut values = HashMap::with_capacity(ir.params.len());
        let referenced: HashSet<usize> = ir
            .residuals
            .iter()
            .flat_map(|r| r.params.iter().map(|id| id.0))
            .collect();

        for param in &ir.params {
            let init = initial.get(&param.name).ok_or_else(|| {
                anyhow!(
                    "initial values missing parameter {} (id {:?})",
                    param.name,
                    param.id
                )
            })?;
            ensure!(
                init.len() == param.dim,
                "initial dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                init.len()
            );
            // tiny-solver needs a Jacobian entry on every diagonal it damps.
            if !referenced.contains(&param.id.0) {
                debug!("parameter {} has no residuals; left unchanged", param.name);
                continue;
            }
            for idx in param.fixed.iter() {
                problem.fix_variable(&param.name, idx);
            }
            values.insert(param.name.clone(), init.clone());
        }

        for residual in &ir.residuals {
            let (factor, loss) = compile_factor(residual)?;
            let param_names: Vec<&str> = residual
                .params
                .iter()
                .map(|id| ir.params[id.0].name.as_str())
                .collect();
            problem.add_residual_block(residual.residual_dim, &param_names, factor, loss);
        }

        Ok((problem, values))
    }
}

fn cost_at(problem: &Problem, params: &ParamMap) -> f64 {
    let param_blocks = problem.initialize_parameter_blocks(params);
    let residuals = problem.compute_residuals(&param_blocks, true);
    0.5 * residuals.as_ref().squared_norm_l2()
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let (problem, mut current) = self.compile(ir, initial)?;
        let optimizer = LevenbergMarquardtOptimizer::default();
        let initial_cost = cost_at(&problem, &current);

        let Some(budget) = opts.time_budget else {
            let solution = optimizer
                .optimize(&problem, &current, Some(to_optimizer_options(opts, opts.max_iters)))
                .ok_or_else(|| anyhow!("tiny-solver failed to converge"))?;
            let final_cost = cost_at(&problem, &solution);
            let mut params = solution;
            restore_unreferenced(ir, initial, &mut params);
            return Ok(BackendSolution {
                params,
                final_cost,
                initial_cost,
                budget_exhausted: false,
            });
        };

        // Run in short bursts so the deadline is checked between them; the
        // best parameters seen so far are kept.
        let deadline = Instant::now() + budget;
        let min_abs = opts.min_abs_decrease.unwrap_or(0.0);
        let min_rel = opts.min_rel_decrease.unwrap_or(0.0);
        let min_error = opts.min_error.unwrap_or(0.0);
        let mut cost = initial_cost;
        let mut remaining = opts.max_iters;
        let mut solved = false;
        let mut budget_exhausted = false;

        while remaining > 0 && cost > min_error {
            let chunk = remaining.min(ITERATIONS_PER_CHECK);
            let Some(next) =
                optimizer.optimize(&problem, &current, Some(to_optimizer_options(opts, chunk)))
            else {
                break;
            };
            solved = true;
            remaining -= chunk;

            let next_cost = cost_at(&problem, &next);
            let decrease = cost - next_cost;
            if next_cost <= cost {
                current = next;
                cost = next_cost;
            }
            if decrease <= min_abs || decrease <= min_rel * cost.max(f64::MIN_POSITIVE) {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    "solve stopped by {:?} budget with cost {:.3e} ({} iterations left)",
                    budget, cost, remaining
                );
                budget_exhausted = true;
                break;
            }
        }
        ensure!(
            solved || cost <= min_error,
            "tiny-solver failed to converge"
        );
        debug!(
            "solve: {} residual blocks, cost {:.3e} -> {:.3e}",
            ir.residuals.len(),
            initial_cost,
            cost
        );

        restore_unreferenced(ir, initial, &mut current);
        Ok(BackendSolution {
            params: current,
            final_cost: cost,
            initial_cost,
            budget_exhausted,
        })
    }

    fn evaluate_cost(&self, ir: &ProblemIR, params: &HashMap<String, DVector<f64>>) -> Result<f64> {
        let (problem, values) = self.compile(ir, params)?;
        Ok(cost_at(&problem, &values))
    }
}

fn to_optimizer_options(opts: &BackendSolveOptions, max_iteration: usize) -> OptimizerOptions {
    let mut options = OptimizerOptions {
        max_iteration,
        verbosity_level: opts.verbosity,
        ..OptimizerOptions::default()
    };
    if let Some(solver) = opts.linear_solver {
        options.linear_solver_type = match solver {
            LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
            LinearSolverKind::SparseQR => LinearSolverType::SparseQR,
        };
    }
    if let Some(v) = opts.min_abs_decrease {
        options.min_abs_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_rel_decrease {
        options.min_rel_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_error {
        options.min_error_threshold = v;
    }
    options
}

fn compile_loss(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    match loss {
        RobustLoss::None => Ok(None),
        RobustLoss::Huber { scale } => {
            ensure!(scale > 0.0, "Huber scale must be positive");
            Ok(Some(Box::new(HuberLoss::new(scale))))
        }
        RobustLoss::Cauchy { scale } => {
            ensure!(scale > 0.0, "Cauchy scale must be positive");
            Ok(Some(Box::new(CauchyLoss::new(scale))))
        }
        RobustLoss::Arctan { scale } => {
            ensure!(scale > 0.0, "Arctan scale must be positive");
            Ok(Some(Box::new(ArctanLoss::new(scale))))
        }
    }
}

type CompiledFactor = (
    Box<dyn tiny_solver::factors::FactorImpl + Send>,
    Option<Box<dyn Loss + Send>>,
);

fn compile_factor(residual: &ResidualBlock) -> Result<CompiledFactor> {
    let loss = compile_loss(residual.loss)?;
    let factor: Box<dyn tiny_solver::factors::FactorImpl + Send> = match &residual.factor {
        FactorKind::SweepAngle {
            sensor,
            lighthouse,
            axis,
            angle,
            motor,
        } => Box::new(TinySweepFactor {
            data: SweepData {
                sensor: *sensor,
                lighthouse: *lighthouse,
                axis: *axis,
                angle: *angle,
                motor: *motor,
            },
        }),
        FactorKind::InertialSmoothing {
            delta_p,
            delta_v,
            delta_q,
            dt,
            gravity,
            weight,
            rotation_weight,
        } => Box::new(TinyInertialFactor {
            data: InertialData {
                delta_p: *delta_p,
                delta_v: *delta_v,
                delta_q: *delta_q,
                dt: *dt,
                gravity: *gravity,
                weight: *weight,
                rotation_weight: *rotation_weight,
            },
        }),
        FactorKind::PosePrior { anchor, weight } => Box::new(TinyPosePriorFactor {
            anchor: *anchor,
            weight: *weight,
        }),
        FactorKind::FrameAlignment {
            tracked,
            reference,
            angle_factor,
        } => Box::new(TinyAlignmentFactor {
            data: AlignmentData {
                tracked: *tracked,
                reference: *reference,
                angle_factor: *angle_factor,
            },
        }),
    };
    Ok((factor, loss))
}

#[derive(Debug, Clone)]
struct TinySweepFactor {
    data: SweepData,
}

impl<T: nalgebra::RealField> Factor<T> for TinySweepFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 1, "expected [pose] parameter block");
        let r = sweep_residual_generic(params[0].as_view(), &self.data);
        DVector::from_row_slice(r.as_slice())
    }
}

#[derive(Debug, Clone)]
struct TinyInertialFactor {
    data: InertialData,
}

impl<T: nalgebra::RealField> Factor<T> for TinyInertialFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(
            params.len(),
            4,
            "expected [pose_i, vel_i, pose_j, vel_j] parameter blocks"
        );
        let r = inertial_residual_generic(
            params[0].as_view(),
            params[1].as_view(),
            params[2].as_view(),
            params[3].as_view(),
            &self.data,
        );
        DVector::from_row_slice(r.as_slice())
    }
}

#[derive(Debug, Clone)]
struct TinyPosePriorFactor {
    anchor: [f64; 6],
    weight: f64,
}

impl<T: nalgebra::RealField> Factor<T> for TinyPosePriorFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 1, "expected [pose] parameter block");
        let r = pose_prior_residual_generic(params[0].as_view(), &self.anchor, self.weight);
        DVector::from_row_slice(r.as_slice())
    }
}

#[derive(Debug, Clone)]
struct TinyAlignmentFactor {
    data: AlignmentData,
}

impl<T: nalgebra::RealField> Factor<T> for TinyAlignmentFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 2, "expected [frame, body] parameter blocks");
        let r = alignment_residual_generic(params[0].as_view(), params[1].as_view(), &self.data);
        DVector::from_row_slice(r.as_slice())
    }
}
