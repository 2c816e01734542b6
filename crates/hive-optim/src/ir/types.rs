use anyhow::{ensure, Result};
use hive_core::Axis;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier for a parameter block in the IR.
///
/// Stable within a `ProblemIR` instance; residual blocks use it to reference
/// their parameter dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// Fixed parameter mask for a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedMask {
    fixed_indices: HashSet<usize>,
}

impl FixedMask {
    pub fn all_free() -> Self {
        Self {
            fixed_indices: HashSet::new(),
        }
    }

    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed_indices: (0..dim).collect(),
        }
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed_indices.contains(&idx)
    }

    pub fn is_all_fixed(&self, dim: usize) -> bool {
        self.fixed_indices.len() == dim
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed_indices.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_indices.is_empty()
    }
}

/// Robust loss applied to a residual block.
///
/// Per-sample robustification comes from using one residual block per
/// observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
    Arctan {
        scale: f64,
    },
}

/// Backend-agnostic factor kinds.
///
/// Each kind implies its parameter layout and residual dimension. Poses are
/// 6D Euclidean blocks `[tx, ty, tz, rx, ry, rz]`, velocities 3D.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Measured minus predicted sweep angle of one sensor.
    ///
    /// Parameters: \[tracker_pose\]. Lighthouse pose `[qx, qy, qz, qw, tx, ty, tz]`
    /// and sensor position are constants.
    SweepAngle {
        sensor: [f64; 3],
        lighthouse: [f64; 7],
        axis: Axis,
        angle: f64,
        motor: Option<[f64; 5]>,
    },
    /// Consistency of two consecutive states with preintegrated inertial motion.
    ///
    /// Parameters: \[pose_i, vel_i, pose_j, vel_j\]. Residual order is
    /// `[position, velocity, rotation]`.
    InertialSmoothing {
        delta_p: [f64; 3],
        delta_v: [f64; 3],
        /// `[qx, qy, qz, qw]`
        delta_q: [f64; 4],
        dt: f64,
        gravity: [f64; 3],
        weight: f64,
        rotation_weight: f64,
    },
    /// Weighted difference between a pose block and a fixed anchor.
    ///
    /// Parameters: \[pose\].
    PosePrior { anchor: [f64; 6], weight: f64 },
    /// Discrepancy between a reference pose and `frame * tracked * body`.
    ///
    /// Parameters: \[frame, body\]. Residual order is `[translation, rotation]`.
    FrameAlignment {
        tracked: [f64; 7],
        reference: [f64; 7],
        angle_factor: f64,
    },
}

impl FactorKind {
    /// Residual dimension implied by the factor.
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::SweepAngle { .. } => 1,
            FactorKind::InertialSmoothing { .. } => 9,
            FactorKind::PosePrior { .. } => 6,
            FactorKind::FrameAlignment { .. } => 6,
        }
    }

    /// Expected dimensions of the parameter blocks, in order.
    fn param_dims(&self) -> &'static [usize] {
        match self {
            FactorKind::SweepAngle { .. } => &[6],
            FactorKind::InertialSmoothing { .. } => &[6, 3, 6, 3],
            FactorKind::PosePrior { .. } => &[6],
            FactorKind::FrameAlignment { .. } => &[6, 6],
        }
    }
}

/// Parameter block definition in the IR.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub fixed: FixedMask,
}

/// Residual block definition in the IR.
///
/// The order of `params` must match the factor's expected parameter order.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub loss: RobustLoss,
    pub factor: FactorKind,
    pub residual_dim: usize,
}

impl ResidualBlock {
    /// Residual block whose dimension follows from the factor.
    pub fn new(params: Vec<ParamId>, loss: RobustLoss, factor: FactorKind) -> Self {
        let residual_dim = factor.residual_dim();
        Self {
            params,
            loss,
            factor,
            residual_dim,
        }
    }
}

/// Backend-agnostic optimization problem representation.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter block and returns its `ParamId`.
    pub fn add_param_block(&mut self, name: impl Into<String>, dim: usize, fixed: FixedMask) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            dim,
            fixed,
        });
        id
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.params.iter().find(|p| p.name == name).map(|p| p.id)
    }

    /// Total number of scalar residuals.
    pub fn residual_count(&self) -> usize {
        self.residuals.iter().map(|r| r.residual_dim).sum()
    }

    /// Number of scalar residuals produced by sweep-angle factors.
    pub fn sweep_residual_count(&self) -> usize {
        self.residuals
            .iter()
            .filter(|r| matches!(r.factor, FactorKind::SweepAngle { .. }))
            .count()
    }

    /// Validates internal consistency and factor expectations.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "param id mismatch: expected {}, got {:?}",
                idx,
                param.id
            );
            ensure!(names.insert(param.name.as_str()), "duplicate param name {}", param.name);
            for fixed_idx in param.fixed.iter() {
                ensure!(
                    fixed_idx < param.dim,
                    "param {} fixed index {} out of range",
                    param.name,
                    fixed_idx
                );
            }
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            ensure!(
                residual.residual_dim == residual.factor.residual_dim(),
                "residual {} dim {} does not match factor expectation {}",
                r_idx,
                residual.residual_dim,
                residual.factor.residual_dim()
            );
            let dims = residual.factor.param_dims();
            ensure!(
                residual.params.len() == dims.len(),
                "residual {} requires {} params, got {}",
                r_idx,
                dims.len(),
                residual.params.len()
            );
            for (param, &dim) in residual.params.iter().zip(dims) {
                ensure!(
                    param.0 < self.params.len(),
                    "residual {} references missing param {:?}",
                    r_idx,
                    param
                );
                let block = &self.params[param.0];
                ensure!(
                    block.dim == dim,
                    "residual {} expects {}D block for {}, got {}D",
                    r_idx,
                    dim,
                    block.name,
                    block.dim
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior() -> FactorKind {
        FactorKind::PosePrior {
            anchor: [0.0; 6],
            weight: 1.0,
        }
    }

    #[test]
    fn validate_accepts_matching_layout() {
        let mut ir = ProblemIR::new();
        let pose = ir.add_param_block("pose/0", 6, FixedMask::all_free());
        ir.add_residual_block(ResidualBlock::new(vec![pose], RobustLoss::None, prior()));
        assert!(ir.validate().is_ok());
        assert_eq!(ir.residual_count(), 6);
        assert_eq!(ir.sweep_residual_count(), 0);
    }

    #[test]
    fn validate_rejects_wrong_block_dimension() {
        let mut ir = ProblemIR::new();
        let vel = ir.add_param_block("vel/0", 3, FixedMask::all_free());
        ir.add_residual_block(ResidualBlock::new(vec![vel], RobustLoss::None, prior()));
        let err = ir.validate().unwrap_err().to_string();
        assert!(err.contains("expects 6D"), "{err}");
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut ir = ProblemIR::new();
        ir.add_param_block("pose", 6, FixedMask::all_free());
        ir.add_param_block("pose", 6, FixedMask::all_free());
        assert!(ir.validate().is_err());
    }
}
