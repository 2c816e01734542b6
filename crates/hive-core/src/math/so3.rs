//! Rotation primitives generic over the scalar type.
//!
//! Quaternions are stored as nalgebra [`Quaternion`]s but combined with
//! explicit formulas so every operation stays differentiable through dual
//! numbers, including at the identity rotation where `sqrt(|ω|²)` has no
//! derivative.

use nalgebra::{Quaternion, RealField, Vector3};

/// Squared angle below which the small-angle series are used.
const SMALL_ANGLE_SQ: f64 = 1.0e-12;

fn constant<T: RealField>(x: f64) -> T {
    T::from_f64(x).unwrap()
}

/// Unit quaternion for the axis-angle vector `w`.
pub fn quat_from_axis_angle<T: RealField>(w: &Vector3<T>) -> Quaternion<T> {
    let theta_sq = w.norm_squared();
    let (real, k) = if theta_sq > constant(SMALL_ANGLE_SQ) {
        let theta = theta_sq.sqrt();
        let half = theta.clone() * constant(0.5);
        (half.clone().cos(), half.sin() / theta)
    } else {
        (
            T::one() - theta_sq.clone() * constant(0.125),
            constant::<T>(0.5) - theta_sq / constant(48.0),
        )
    };
    Quaternion::new(
        real,
        w.x.clone() * k.clone(),
        w.y.clone() * k.clone(),
        w.z.clone() * k,
    )
}

/// Quaternion from a stored `[qx, qy, qz, qw]` constant.
pub fn quat_from_array<T: RealField>(q: &[f64; 4]) -> Quaternion<T> {
    Quaternion::new(constant(q[3]), constant(q[0]), constant(q[1]), constant(q[2]))
}

/// Hamilton product `a * b`.
pub fn quat_mul<T: RealField>(a: &Quaternion<T>, b: &Quaternion<T>) -> Quaternion<T> {
    let (aw, ax, ay, az) = (a.w.clone(), a.i.clone(), a.j.clone(), a.k.clone());
    let (bw, bx, by, bz) = (b.w.clone(), b.i.clone(), b.j.clone(), b.k.clone());
    Quaternion::new(
        aw.clone() * bw.clone() - ax.clone() * bx.clone() - ay.clone() * by.clone()
            - az.clone() * bz.clone(),
        aw.clone() * bx.clone() + ax.clone() * bw.clone() + ay.clone() * bz.clone()
            - az.clone() * by.clone(),
        aw.clone() * by.clone() - ax.clone() * bz.clone() + ay.clone() * bw.clone()
            + az.clone() * bx.clone(),
        aw * bz + ax * by - ay * bx + az * bw,
    )
}

/// Conjugate, equal to the inverse for unit quaternions.
pub fn quat_conjugate<T: RealField>(q: &Quaternion<T>) -> Quaternion<T> {
    Quaternion::new(q.w.clone(), -q.i.clone(), -q.j.clone(), -q.k.clone())
}

/// Rotate `v` by the unit quaternion `q`.
pub fn quat_rotate<T: RealField>(q: &Quaternion<T>, v: &Vector3<T>) -> Vector3<T> {
    let u = Vector3::new(q.i.clone(), q.j.clone(), q.k.clone());
    let two: T = constant(2.0);
    let uv = u.cross(v) * two.clone();
    v + uv.clone() * q.w.clone() + u.cross(&uv)
}

/// Rotate `v` by the axis-angle vector `w`.
pub fn rotate_axis_angle<T: RealField>(w: &Vector3<T>, v: &Vector3<T>) -> Vector3<T> {
    quat_rotate(&quat_from_axis_angle(w), v)
}

/// Logarithm map: axis-angle vector of the unit quaternion `q`.
///
/// The result always has magnitude in `[0, π]`.
pub fn quat_log<T: RealField>(q: &Quaternion<T>) -> Vector3<T> {
    let (w, v) = if q.w < T::zero() {
        (
            -q.w.clone(),
            Vector3::new(-q.i.clone(), -q.j.clone(), -q.k.clone()),
        )
    } else {
        (
            q.w.clone(),
            Vector3::new(q.i.clone(), q.j.clone(), q.k.clone()),
        )
    };
    let vn_sq = v.norm_squared();
    if vn_sq > constant(SMALL_ANGLE_SQ) {
        let vn = vn_sq.sqrt();
        let angle = vn.clone().atan2(w) * constant(2.0);
        v * (angle / vn)
    } else {
        v * (constant::<T>(2.0) / w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    #[test]
    fn axis_angle_quaternion_matches_nalgebra() {
        for w in [
            Vector3::new(0.3, -0.2, 0.9),
            Vector3::new(1e-9, 0.0, -2e-9),
            Vector3::new(0.0, 3.0, 0.0),
        ] {
            let ours = quat_from_axis_angle(&w);
            let reference = UnitQuaternion::from_scaled_axis(w);
            let v = Vector3::new(0.4, -1.1, 2.0);
            let a = quat_rotate(&ours, &v);
            let b = reference.transform_vector(&v);
            assert!((a - b).norm() < 1e-12, "rotation mismatch for {w:?}");
        }
    }

    #[test]
    fn log_inverts_exp() {
        let w = Vector3::new(-0.7, 0.25, 1.3);
        let back = quat_log(&quat_from_axis_angle(&w));
        assert!((back - w).norm() < 1e-12);

        let tiny = Vector3::new(1e-8, -3e-8, 2e-8);
        let back = quat_log(&quat_from_axis_angle(&tiny));
        assert!((back - tiny).norm() < 1e-15);
    }

    #[test]
    fn composition_matches_nalgebra() {
        let a = Vector3::new(0.2, 0.1, -0.4);
        let b = Vector3::new(-0.3, 0.8, 0.05);
        let q = quat_mul(&quat_from_axis_angle(&a), &quat_from_axis_angle(&b));
        let r = UnitQuaternion::from_scaled_axis(a) * UnitQuaternion::from_scaled_axis(b);
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert!((quat_rotate(&q, &v) - r.transform_vector(&v)).norm() < 1e-12);

        let inv = quat_mul(&quat_conjugate(&q), &q);
        assert!(quat_log(&inv).norm() < 1e-12);
    }
}
