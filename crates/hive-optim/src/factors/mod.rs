//! Residual models for lighthouse pose estimation.
//!
//! Each factor is a generic function over [`nalgebra::RealField`] so the
//! backend can evaluate it with dual numbers for automatic differentiation.
//!
//! - [`sweep`]: measured minus predicted sweep angle,
//! - [`inertial`]: IMU preintegration and the smoothing residual between
//!   consecutive window states,
//! - [`prior`]: anchor on a pose block,
//! - [`alignment`]: frame-alignment residual for offset refinement.

pub mod alignment;
pub mod inertial;
pub mod prior;
pub mod sweep;
