//! Core types for lighthouse tracking.
//!
//! This crate contains:
//! - linear algebra aliases and SO(3) helpers generic over the scalar,
//! - the data model: sensors, trackers, lighthouses, samples and poses,
//! - the sweep projection model shared by every solver,
//! - driver-boundary unit conversions,
//! - deterministic synthetic scenes for tests.

/// Driver-boundary conversions.
pub mod driver;
/// Setup-time errors.
pub mod error;
/// Linear algebra type aliases and rotation helpers.
pub mod math;
/// Sweep projection model.
pub mod models;
/// Synthetic data generators.
pub mod synthetic;
/// Data model.
pub mod types;

pub use error::SetupError;
pub use math::*;
pub use models::*;
pub use types::*;
