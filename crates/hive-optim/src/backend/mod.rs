//! Backend adapters that compile the IR into solver-specific problems.
//!
//! Backends translate the IR into a solver-native graph, run the optimizer
//! under the requested iteration and wall-clock limits, and return the solved
//! parameter map together with the final robustified cost.

mod tiny_solver_backend;

use anyhow::Result;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::ir::ProblemIR;

pub use tiny_solver_backend::TinySolverBackend;

/// Backend-agnostic solver options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSolveOptions {
    /// Maximum number of iterations for the optimizer.
    pub max_iters: usize,
    /// Wall-clock budget; the best result so far is returned once it runs out.
    pub time_budget: Option<Duration>,
    /// Verbosity level (backend-specific).
    pub verbosity: usize,
    /// Optional linear solver selection.
    pub linear_solver: Option<LinearSolverKind>,
    /// Absolute error decrease threshold for early termination.
    pub min_abs_decrease: Option<f64>,
    /// Relative error decrease threshold for early termination.
    pub min_rel_decrease: Option<f64>,
    /// Error threshold for early termination.
    pub min_error: Option<f64>,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            time_budget: None,
            verbosity: 0,
            linear_solver: Some(LinearSolverKind::SparseCholesky),
            min_abs_decrease: Some(1e-12),
            min_rel_decrease: Some(1e-10),
            min_error: Some(1e-16),
        }
    }
}

/// Linear solver selection (backend-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    SparseCholesky,
    SparseQR,
}

/// Solver output from a backend.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    /// Optimized parameter vectors keyed by block name.
    pub params: HashMap<String, DVector<f64>>,
    /// Final robustified cost `½ Σ ρ(‖r‖²)`.
    pub final_cost: f64,
    /// Cost at the initial values.
    pub initial_cost: f64,
    /// `true` when the wall-clock budget stopped the solve early.
    pub budget_exhausted: bool,
}

/// Backend interface implemented by solver adapters.
pub trait OptimBackend {
    /// Solve a compiled IR with the provided initial parameters.
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution>;

    /// Robustified cost of the IR at the given parameters.
    fn evaluate_cost(&self, ir: &ProblemIR, params: &HashMap<String, DVector<f64>>) -> Result<f64>;
}

/// Solve a problem with the default backend.
pub fn solve_with_backend(
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &BackendSolveOptions,
) -> Result<BackendSolution> {
    TinySolverBackend.solve(ir, initial, opts)
}

/// Cost of a problem at `params` with the default backend.
pub fn evaluate_cost(ir: &ProblemIR, params: &HashMap<String, DVector<f64>>) -> Result<f64> {
    TinySolverBackend.evaluate_cost(ir, params)
}
