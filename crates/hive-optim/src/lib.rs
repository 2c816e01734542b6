//! Nonlinear least-squares for lighthouse tracking, built on tiny-solver.
//!
//! Problems are expressed in a backend-independent IR of typed parameter
//! blocks and factor residuals, then compiled for the tiny-solver
//! Levenberg–Marquardt backend. On top of this sit the three solvers used by
//! the pipeline: single-frame pose, windowed pose graph, and frame-offset
//! refinement.

pub mod backend;
pub mod factors;
pub mod ir;
pub mod params;
pub mod problems;
pub mod validity;

pub use crate::backend::{solve_with_backend, BackendSolveOptions};
pub use crate::ir::RobustLoss;
pub use crate::params::{PoseParams, VelocityParams};
pub use crate::problems::{
    refine_offset, solve_single_frame, OffsetRefineOptions, PoseGraphOptions, SolverOptions,
    SweepModel,
};
pub use crate::validity::{Rejection, ValidityThresholds};
