//! Averaging of rigid transforms.

use hive_core::{Iso3, Real, Vec3};
use nalgebra::{Matrix4, Quaternion, SymmetricEigen, Translation3, UnitQuaternion};

/// Eigen-average of unit quaternions.
///
/// Returns the quaternion maximizing `Σ (qᵢ · q)²`, which is insensitive to
/// the sign ambiguity of each input. `None` for an empty slice.
pub fn average_rotations(rotations: &[UnitQuaternion<Real>]) -> Option<UnitQuaternion<Real>> {
    if rotations.is_empty() {
        return None;
    }
    let mut m = Matrix4::<Real>::zeros();
    for q in rotations {
        let v = q.coords;
        m += v * v.transpose();
    }
    let eig = SymmetricEigen::new(m);
    let best = eig.eigenvalues.imax();
    let v = eig.eigenvectors.column(best);
    // coords are stored as [i, j, k, w]
    let q = Quaternion::new(v[3], v[0], v[1], v[2]);
    Some(UnitQuaternion::from_quaternion(q))
}

/// Mean translation and eigen-averaged rotation of a set of poses.
pub fn average_poses(poses: &[Iso3]) -> Option<Iso3> {
    if poses.is_empty() {
        return None;
    }
    let translation = poses
        .iter()
        .fold(Vec3::zeros(), |acc, p| acc + p.translation.vector)
        / poses.len() as Real;
    let rotations: Vec<_> = poses.iter().map(|p| p.rotation).collect();
    let rotation = average_rotations(&rotations)?;
    Some(Iso3::from_parts(Translation3::from(translation), rotation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_average() {
        assert!(average_poses(&[]).is_none());
        assert!(average_rotations(&[]).is_none());
    }

    #[test]
    fn symmetric_perturbations_average_out() {
        let center = Iso3::from_parts(
            Translation3::new(0.5, -0.2, 1.0),
            UnitQuaternion::from_scaled_axis(Vec3::new(0.1, 0.4, -0.3)),
        );
        let mut poses = Vec::new();
        for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
            for sign in [-1.0, 1.0] {
                let delta = Iso3::from_parts(
                    Translation3::from(axis * 0.01 * sign),
                    UnitQuaternion::from_scaled_axis(axis * 0.02 * sign),
                );
                poses.push(center * delta);
            }
        }
        let avg = average_poses(&poses).unwrap();
        assert!((avg.translation.vector - center.translation.vector).norm() < 1e-4);
        assert!(avg.rotation.angle_to(&center.rotation) < 1e-4);
    }

    #[test]
    fn sign_flipped_quaternions_average_consistently() {
        let q = UnitQuaternion::from_scaled_axis(Vec3::new(0.0, 0.0, 2.0));
        let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
        let avg = average_rotations(&[q, flipped, q]).unwrap();
        assert!(avg.angle_to(&q) < 1e-9);
    }
}
