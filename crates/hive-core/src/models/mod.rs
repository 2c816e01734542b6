//! Measurement models.

pub mod sweep;

pub use sweep::*;
