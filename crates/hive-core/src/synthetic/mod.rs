//! Deterministic synthetic data for tests and demos.
//!
//! - [`scene`]: tracker layouts, lighthouse placements and sweep synthesis,
//! - [`motion`]: smooth trajectories with matching IMU readings and paired
//!   pose sequences for frame alignment,
//! - [`noise`]: seeded noise that does not depend on an RNG implementation.

pub mod motion;
pub mod noise;
pub mod scene;
