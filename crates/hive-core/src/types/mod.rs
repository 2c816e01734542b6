//! Data model shared by every estimator.

mod imu;
mod light;
mod lighthouse;
mod pose;
mod time;
mod tracker;

pub use imu::*;
pub use light::*;
pub use lighthouse::*;
pub use pose::*;
pub use time::*;
pub use tracker::*;
