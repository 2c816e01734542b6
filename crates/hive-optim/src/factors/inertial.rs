//! IMU preintegration between window states.
//!
//! Accelerometer and gyroscope readings between two states are integrated in
//! the body frame of the earlier state:
//!
//! - `Δq ← Δq · exp(ω dt)`
//! - `Δp ← Δp + Δv dt + ½ (Δq f) dt²`
//! - `Δv ← Δv + (Δq f) dt`
//!
//! where `f` is the specific force. With gravity `g` in the reference frame
//! the later state is predicted as
//! `p_j = p_i + v_i Δt + ½ g Δt² + R_i Δp`, `v_j = v_i + g Δt + R_i Δv`,
//! `R_j = R_i Δq`.

use hive_core::math::so3::{
    quat_conjugate, quat_from_array, quat_from_axis_angle, quat_log, quat_mul, quat_rotate,
};
use hive_core::{Iso3, Vec3};
use nalgebra::{DVectorView, RealField, SVector, Translation3, UnitQuaternion, Vector3};

use crate::ir::FactorKind;

/// Accumulated inertial motion since the previous window state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preintegration {
    pub delta_p: Vec3,
    pub delta_v: Vec3,
    pub delta_q: UnitQuaternion<f64>,
    /// Integrated time span (seconds).
    pub dt: f64,
    /// Number of samples integrated.
    pub samples: usize,
}

impl Default for Preintegration {
    fn default() -> Self {
        Self {
            delta_p: Vec3::zeros(),
            delta_v: Vec3::zeros(),
            delta_q: UnitQuaternion::identity(),
            dt: 0.0,
            samples: 0,
        }
    }
}

impl Preintegration {
    /// Integrate one reading held constant over `dt` seconds.
    pub fn integrate(&mut self, accel: &Vec3, gyro: &Vec3, dt: f64) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let a = self.delta_q * accel;
        self.delta_p += self.delta_v * dt + 0.5 * a * dt * dt;
        self.delta_v += a * dt;
        self.delta_q *= UnitQuaternion::from_scaled_axis(gyro * dt);
        self.dt += dt;
        self.samples += 1;
    }

    /// Predict the later state from the earlier one.
    pub fn predict(&self, pose: &Iso3, velocity: &Vec3, gravity: &Vec3) -> (Iso3, Vec3) {
        let r_i = pose.rotation;
        let t = pose.translation.vector
            + velocity * self.dt
            + gravity * (0.5 * self.dt * self.dt)
            + r_i * self.delta_p;
        let v = velocity + gravity * self.dt + r_i * self.delta_v;
        (
            Iso3::from_parts(Translation3::from(t), r_i * self.delta_q),
            v,
        )
    }

    /// Smoothing factor between the two states this preintegration spans.
    pub fn to_factor(&self, gravity: &Vec3, weight: f64, rotation_weight: f64) -> FactorKind {
        let q = self.delta_q.quaternion();
        FactorKind::InertialSmoothing {
            delta_p: [self.delta_p.x, self.delta_p.y, self.delta_p.z],
            delta_v: [self.delta_v.x, self.delta_v.y, self.delta_v.z],
            delta_q: [q.i, q.j, q.k, q.w],
            dt: self.dt,
            gravity: [gravity.x, gravity.y, gravity.z],
            weight,
            rotation_weight,
        }
    }
}

/// Constants of an inertial smoothing residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertialData {
    pub delta_p: [f64; 3],
    pub delta_v: [f64; 3],
    pub delta_q: [f64; 4],
    pub dt: f64,
    pub gravity: [f64; 3],
    pub weight: f64,
    pub rotation_weight: f64,
}

fn vec3<T: RealField>(v: &[f64; 3]) -> Vector3<T> {
    Vector3::new(
        T::from_f64(v[0]).unwrap(),
        T::from_f64(v[1]).unwrap(),
        T::from_f64(v[2]).unwrap(),
    )
}

fn head3<T: RealField>(v: &DVectorView<'_, T>, offset: usize) -> Vector3<T> {
    Vector3::new(
        v[offset].clone(),
        v[offset + 1].clone(),
        v[offset + 2].clone(),
    )
}

/// 9D residual `[position, velocity, rotation]` between states `i` and `j`.
pub fn inertial_residual_generic<T: RealField>(
    pose_i: DVectorView<'_, T>,
    vel_i: DVectorView<'_, T>,
    pose_j: DVectorView<'_, T>,
    vel_j: DVectorView<'_, T>,
    data: &InertialData,
) -> SVector<T, 9> {
    let t_i = head3(&pose_i, 0);
    let t_j = head3(&pose_j, 0);
    let q_i = quat_from_axis_angle(&head3(&pose_i, 3));
    let q_j = quat_from_axis_angle(&head3(&pose_j, 3));
    let v_i = head3(&vel_i, 0);
    let v_j = head3(&vel_j, 0);

    let dt = T::from_f64(data.dt).unwrap();
    let half_dt_sq = T::from_f64(0.5 * data.dt * data.dt).unwrap();
    let g = vec3::<T>(&data.gravity);
    let q_i_inv = quat_conjugate(&q_i);

    let dp_world = t_j - t_i - v_i.clone() * dt.clone() - g.clone() * half_dt_sq;
    let r_p = quat_rotate(&q_i_inv, &dp_world) - vec3::<T>(&data.delta_p);

    let dv_world = v_j - v_i - g * dt;
    let r_v = quat_rotate(&q_i_inv, &dv_world) - vec3::<T>(&data.delta_v);

    let dq_inv = quat_conjugate(&quat_from_array::<T>(&data.delta_q));
    let q_rel = quat_mul(&q_i_inv, &q_j);
    let r_q = quat_log(&quat_mul(&dq_inv, &q_rel)) * T::from_f64(data.rotation_weight).unwrap();

    let w = T::from_f64(data.weight).unwrap();
    let mut out = SVector::<T, 9>::zeros();
    for k in 0..3 {
        out[k] = r_p[k].clone() * w.clone();
        out[3 + k] = r_v[k].clone() * w.clone();
        out[6 + k] = r_q[k].clone() * w.clone();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::synthetic::motion::ConstantMotion;
    use hive_core::{pose6_from_iso, Timestamp};
    use nalgebra::DVector;

    fn motion() -> ConstantMotion {
        ConstantMotion {
            start: hive_core::iso_from_parts(&Vec3::new(0.1, 0.2, 1.5), &Vec3::new(0.2, -0.1, 0.4)),
            velocity: Vec3::new(0.3, -0.1, 0.05),
            angular_rate: Vec3::new(0.0, 0.5, 0.2),
            gravity: Vec3::new(0.0, 0.0, -9.80665),
        }
    }

    fn integrate(m: &ConstantMotion, t0: f64, t1: f64, steps: usize) -> Preintegration {
        let mut pre = Preintegration::default();
        let dt = (t1 - t0) / steps as f64;
        for k in 0..steps {
            let t = t0 + k as f64 * dt;
            let s = m.imu_at(t, Timestamp::from_secs_f64(t));
            pre.integrate(&s.accel, &s.gyro, dt);
        }
        pre
    }

    #[test]
    fn prediction_follows_constant_motion() {
        let m = motion();
        let pre = integrate(&m, 0.0, 0.1, 200);
        let (pose, vel) = pre.predict(&m.pose_at(0.0), &m.velocity, &m.gravity);
        let truth = m.pose_at(0.1);
        assert!((pose.translation.vector - truth.translation.vector).norm() < 1e-5);
        assert!(pose.rotation.angle_to(&truth.rotation) < 1e-6);
        assert!((vel - m.velocity).norm() < 1e-4);
        assert_eq!(pre.samples, 200);
        assert!((pre.dt - 0.1).abs() < 1e-12);
    }

    #[test]
    fn residual_is_small_for_consistent_states() {
        let m = motion();
        let pre = integrate(&m, 0.0, 0.05, 100);
        let FactorKind::InertialSmoothing {
            delta_p,
            delta_v,
            delta_q,
            dt,
            gravity,
            ..
        } = pre.to_factor(&m.gravity, 1.0, 1.0)
        else {
            unreachable!()
        };
        let data = InertialData {
            delta_p,
            delta_v,
            delta_q,
            dt,
            gravity,
            weight: 1.0,
            rotation_weight: 1.0,
        };
        let pi = DVector::from_row_slice(&pose6_from_iso(&m.pose_at(0.0)));
        let pj = DVector::from_row_slice(&pose6_from_iso(&m.pose_at(0.05)));
        let v = DVector::from_row_slice(m.velocity.as_slice());
        let r = inertial_residual_generic(pi.as_view(), v.as_view(), pj.as_view(), v.as_view(), &data);
        assert!(r.norm() < 1e-4, "residual {}", r.norm());

        let pj_off = DVector::from_row_slice(&[pj[0] + 0.05, pj[1], pj[2], pj[3], pj[4], pj[5]]);
        let r_off =
            inertial_residual_generic(pi.as_view(), v.as_view(), pj_off.as_view(), v.as_view(), &data);
        assert!(r_off.norm() > 0.04);
    }

    #[test]
    fn non_positive_steps_are_ignored() {
        let mut pre = Preintegration::default();
        pre.integrate(&Vec3::x(), &Vec3::y(), 0.0);
        pre.integrate(&Vec3::x(), &Vec3::y(), -1.0);
        assert_eq!(pre, Preintegration::default());
    }
}
