use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

use super::Timestamp;
use crate::{iso_from_parts, renormalize_axis_angle, Iso3, Real, Vec3, POSE_DIM};

/// Tracker pose in the reference frame: translation plus axis-angle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolvedPose {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub valid: bool,
    pub stamp: Timestamp,
}

impl Default for SolvedPose {
    fn default() -> Self {
        Self::canonical()
    }
}

impl SolvedPose {
    /// Start pose used when no prior estimate exists: one unit along +z, no rotation.
    pub fn canonical() -> Self {
        Self::from_params(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
    }

    /// Build an invalid, unstamped pose from flattened parameters.
    pub fn from_params(p: &[Real; POSE_DIM]) -> Self {
        Self {
            translation: Vec3::new(p[0], p[1], p[2]),
            rotation: Vec3::new(p[3], p[4], p[5]),
            valid: false,
            stamp: Timestamp::default(),
        }
    }

    pub fn from_iso(iso: &Iso3) -> Self {
        Self::from_params(&crate::pose6_from_iso(iso))
    }

    pub fn params(&self) -> [Real; POSE_DIM] {
        let (t, w) = (self.translation, self.rotation);
        [t.x, t.y, t.z, w.x, w.y, w.z]
    }

    pub fn to_iso(&self) -> Iso3 {
        iso_from_parts(&self.translation, &self.rotation)
    }

    pub fn orientation(&self) -> UnitQuaternion<Real> {
        UnitQuaternion::from_scaled_axis(self.rotation)
    }

    /// Wrap the rotation magnitude into `(-π, π]`.
    pub fn renormalize(&mut self) {
        self.rotation = renormalize_axis_angle(&self.rotation);
    }
}

/// A pose with the time it was observed.
pub type StampedPose = (Timestamp, Iso3);

/// Pose delivered to consumers: translation, quaternion and frame ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub parent_frame: String,
    pub child_frame: String,
    pub stamp: Timestamp,
    pub translation: Vec3,
    pub rotation: UnitQuaternion<Real>,
}

impl TransformStamped {
    pub fn from_pose(pose: &SolvedPose, parent: &str, child: &str) -> Self {
        Self {
            parent_frame: parent.to_string(),
            child_frame: child.to_string(),
            stamp: pose.stamp,
            translation: pose.translation,
            rotation: pose.orientation(),
        }
    }

    pub fn to_iso(&self) -> Iso3 {
        Iso3::from_parts(self.translation.into(), self.rotation)
    }
}

/// Estimator that produced an [`OffsetTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetMethod {
    ClosedForm,
    Refined,
}

/// Rigid relation between the tracking frame and an external reference system.
///
/// `reference_i = frame * tracked_i * body`, where `frame` maps the tracking
/// frame into the reference frame and `body` maps the reference marker into
/// the tracker body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetTransform {
    pub frame: Iso3,
    pub body: Iso3,
    pub method: OffsetMethod,
    /// Final robustified cost when the candidate was scored.
    pub cost: Option<f64>,
}

impl OffsetTransform {
    /// Predicted reference pose for a tracked pose.
    pub fn apply(&self, tracked: &Iso3) -> Iso3 {
        self.frame * tracked * self.body
    }
}
