//! Acceptance rules for solved tracker poses.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::PoseParams;

/// Thresholds a solved pose must satisfy to be published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityThresholds {
    /// Largest acceptable final cost per sweep residual.
    pub cost_per_residual: f64,
    /// Largest acceptable distance from the reference origin (meters).
    pub max_translation: f64,
    /// The tracker z-translation must be strictly greater than this.
    pub min_depth: f64,
}

impl Default for ValidityThresholds {
    fn default() -> Self {
        Self {
            cost_per_residual: 1e-4,
            max_translation: 20.0,
            min_depth: 0.0,
        }
    }
}

/// Reason a solved pose was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Rejection {
    #[error("no lighthouse contributed residuals")]
    NoResiduals,
    #[error("solved pose is not finite")]
    NonFinite,
    #[error("final cost {cost:.3e} exceeds {limit:.3e}")]
    CostTooHigh { cost: f64, limit: f64 },
    #[error("translation norm {norm:.3} exceeds {limit:.3}")]
    TooFar { norm: f64, limit: f64 },
    #[error("depth {depth:.3} is not beyond {limit:.3}")]
    TooShallow { depth: f64, limit: f64 },
}

impl ValidityThresholds {
    /// Check a solved pose against the thresholds.
    ///
    /// `residuals` is the number of sweep residuals the cost was computed over.
    pub fn check(&self, pose: &PoseParams, cost: f64, residuals: usize) -> Result<(), Rejection> {
        let verdict = self.verdict(pose, cost, residuals);
        if let Err(reason) = &verdict {
            debug!("pose rejected: {reason}");
        }
        verdict
    }

    fn verdict(&self, pose: &PoseParams, cost: f64, residuals: usize) -> Result<(), Rejection> {
        if residuals == 0 {
            return Err(Rejection::NoResiduals);
        }
        if !pose.is_finite() || !cost.is_finite() {
            return Err(Rejection::NonFinite);
        }
        let limit = self.cost_per_residual * residuals as f64;
        if cost > limit {
            return Err(Rejection::CostTooHigh { cost, limit });
        }
        let norm = pose.translation.norm();
        if norm > self.max_translation {
            return Err(Rejection::TooFar {
                norm,
                limit: self.max_translation,
            });
        }
        let depth = pose.translation.z;
        if depth <= self.min_depth {
            return Err(Rejection::TooShallow {
                depth,
                limit: self.min_depth,
            });
        }
        Ok(())
    }
}
