//! Linear algebra aliases and rotation helpers.
//!
//! Poses are stored as six numbers `[tx, ty, tz, rx, ry, rz]`: a translation
//! followed by an axis-angle rotation. The generic helpers in [`so3`] work on
//! any [`nalgebra::RealField`] so the same code drives both plain evaluation
//! and automatic differentiation inside the solvers.

use nalgebra::{Isometry3, Matrix3, Point3, Translation3, UnitQuaternion, Vector3};
use std::f64::consts::PI;

pub mod so3;

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Number of scalars in a flattened pose (translation + axis-angle).
pub const POSE_DIM: usize = 6;

/// Wrap an axis-angle vector so that its magnitude lies in `(-π, π]`.
///
/// A rotation of magnitude `θ > π` about `u` equals a rotation of `θ - 2π`
/// about the same axis, so the vector is rescaled by `(θ - 2π) / θ` until it
/// fits. The result may point opposite to the input.
pub fn renormalize_axis_angle(w: &Vec3) -> Vec3 {
    let mut w = *w;
    let mut angle = w.norm();
    if !angle.is_finite() {
        return w;
    }
    while angle > PI {
        w *= (angle - 2.0 * PI) / angle;
        angle = w.norm();
    }
    w
}

/// Build an isometry from a translation and an axis-angle vector.
pub fn iso_from_parts(translation: &Vec3, axis_angle: &Vec3) -> Iso3 {
    Iso3::from_parts(
        Translation3::from(*translation),
        UnitQuaternion::from_scaled_axis(*axis_angle),
    )
}

/// Build an isometry from a flattened `[t, ω]` pose.
pub fn iso_from_pose6(p: &[Real; POSE_DIM]) -> Iso3 {
    iso_from_parts(&Vec3::new(p[0], p[1], p[2]), &Vec3::new(p[3], p[4], p[5]))
}

/// Flatten an isometry into `[t, ω]`.
pub fn pose6_from_iso(iso: &Iso3) -> [Real; POSE_DIM] {
    let t = iso.translation.vector;
    let w = iso.rotation.scaled_axis();
    [t.x, t.y, t.z, w.x, w.y, w.z]
}

/// Pack an isometry as `[qx, qy, qz, qw, tx, ty, tz]` for storage inside factors.
pub fn iso_to_array7(iso: &Iso3) -> [Real; 7] {
    let q = iso.rotation.quaternion();
    let t = iso.translation.vector;
    [q.i, q.j, q.k, q.w, t.x, t.y, t.z]
}

/// Rotation angle (radians) of the relative rotation between two orientations.
pub fn rotation_distance(a: &UnitQuaternion<Real>, b: &UnitQuaternion<Real>) -> Real {
    a.angle_to(b)
}

/// Skew-symmetric matrix such that `skew(v) * x = v × x`.
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renormalize_keeps_small_rotations() {
        let w = Vec3::new(0.1, -0.2, 0.3);
        assert_eq!(renormalize_axis_angle(&w), w);
    }

    #[test]
    fn renormalize_wraps_large_rotations() {
        let axis = Vec3::new(1.0, 2.0, -0.5).normalize();
        for angle in [PI + 1e-3, 1.5 * PI, 2.0 * PI - 0.1, 3.5 * PI, 7.0 * PI + 0.2] {
            let w = axis * angle;
            let r = renormalize_axis_angle(&w);
            assert!(r.norm() <= PI + 1e-12, "angle {angle} wrapped to {}", r.norm());

            let qa = UnitQuaternion::from_scaled_axis(w);
            let qb = UnitQuaternion::from_scaled_axis(r);
            assert!(qa.angle_to(&qb) < 1e-9, "rotation changed for angle {angle}");
        }
    }

    #[test]
    fn pose6_roundtrip_preserves_transform() {
        let p = [0.3, -0.1, 1.7, 0.2, -0.4, 0.1];
        let iso = iso_from_pose6(&p);
        let back = pose6_from_iso(&iso);
        for (a, b) in p.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
