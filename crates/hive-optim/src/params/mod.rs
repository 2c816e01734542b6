//! Typed parameter blocks.
//!
//! Solvers manipulate structured poses and velocities; flattening into
//! `DVector`s happens only at the backend boundary through these types.
//!
//! - [`pose6::PoseParams`] - translation + axis-angle tracker pose (6D)
//! - [`pose6::VelocityParams`] - linear velocity (3D)

pub mod pose6;

pub use pose6::{PoseParams, VelocityParams};
