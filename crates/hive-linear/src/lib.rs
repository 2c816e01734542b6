//! Closed-form estimators for frame alignment.
//!
//! - [`handeye`]: Tsai–Lenz `AX = XB` over all motion pairs, recovering the
//!   tracker-to-marker transform and then the frame offset,
//! - [`average`]: rigid pose averaging (translation mean, quaternion eigen-average).

pub mod average;
pub mod handeye;

pub use average::*;
pub use handeye::*;
