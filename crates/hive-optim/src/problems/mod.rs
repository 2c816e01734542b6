//! Problem builders and solvers.
//!
//! Each problem follows the same shape: build a [`crate::ir::ProblemIR`] plus
//! an initial parameter map, hand it to the backend, then unpack the typed
//! parameter blocks from the solution.

pub mod offset_refine;
pub mod pose_graph;
pub mod single_frame;
mod sweeps;

pub use offset_refine::{build_offset_ir, offset_cost, refine_offset, OffsetRefineOptions};
pub use pose_graph::{
    build_pose_graph_ir, optimize_pose_graph, PoseGraphOptions, PoseGraphResult, WindowState,
};
pub use single_frame::{
    build_single_frame_ir, optimize_single_frame, solve_single_frame, SingleFrameResult,
    SolverOptions,
};
pub use sweeps::SweepModel;
