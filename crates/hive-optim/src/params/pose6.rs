//! Pose and velocity parameter blocks.

use anyhow::{ensure, Result};
use hive_core::{iso_from_parts, Iso3, SolvedPose, Vec3, POSE_DIM};
use nalgebra::{DVector, DVectorView};

/// 6-parameter pose block `[tx, ty, tz, rx, ry, rz]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseParams {
    pub translation: Vec3,
    pub rotation: Vec3,
}

impl PoseParams {
    pub const DIM: usize = POSE_DIM;

    pub fn to_dvec(&self) -> DVector<f64> {
        let (t, w) = (self.translation, self.rotation);
        nalgebra::dvector![t.x, t.y, t.z, w.x, w.y, w.z]
    }

    pub fn from_dvec(v: DVectorView<'_, f64>) -> Result<Self> {
        ensure!(
            v.len() == Self::DIM,
            "expected pose vector of length {}, got {}",
            Self::DIM,
            v.len()
        );
        Ok(Self {
            translation: Vec3::new(v[0], v[1], v[2]),
            rotation: Vec3::new(v[3], v[4], v[5]),
        })
    }

    pub fn to_array(&self) -> [f64; POSE_DIM] {
        let (t, w) = (self.translation, self.rotation);
        [t.x, t.y, t.z, w.x, w.y, w.z]
    }

    pub fn from_iso(iso: &Iso3) -> Self {
        Self {
            translation: iso.translation.vector,
            rotation: iso.rotation.scaled_axis(),
        }
    }

    pub fn to_iso(&self) -> Iso3 {
        iso_from_parts(&self.translation, &self.rotation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.iter().chain(self.rotation.iter()).all(|v| v.is_finite())
    }
}

impl From<&SolvedPose> for PoseParams {
    fn from(pose: &SolvedPose) -> Self {
        Self {
            translation: pose.translation,
            rotation: pose.rotation,
        }
    }
}

/// 3-parameter linear velocity block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityParams(pub Vec3);

impl VelocityParams {
    pub const DIM: usize = 3;

    pub fn to_dvec(&self) -> DVector<f64> {
        nalgebra::dvector![self.0.x, self.0.y, self.0.z]
    }

    pub fn from_dvec(v: DVectorView<'_, f64>) -> Result<Self> {
        ensure!(
            v.len() == Self::DIM,
            "expected velocity vector of length {}, got {}",
            Self::DIM,
            v.len()
        );
        Ok(Self(Vec3::new(v[0], v[1], v[2])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dvec_rejects_wrong_length() {
        let v = DVector::from_vec(vec![0.0; 7]);
        assert!(PoseParams::from_dvec(v.as_view()).is_err());
        assert!(VelocityParams::from_dvec(v.as_view()).is_err());
    }

    #[test]
    fn iso_conversion_matches_axis_angle() {
        let p = PoseParams {
            translation: Vec3::new(0.1, 0.2, 1.5),
            rotation: Vec3::new(0.0, 0.4, -0.1),
        };
        let back = PoseParams::from_iso(&p.to_iso());
        assert!((back.translation - p.translation).norm() < 1e-12);
        assert!((back.rotation - p.rotation).norm() < 1e-12);
    }
}
