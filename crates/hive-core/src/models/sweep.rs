//! Lighthouse sweep projection model.
//!
//! A sensor at `p_t` on the tracker maps into the lighthouse frame as
//! `p_l = R_lᵀ (R_t p_t + t_t - t_l)`, where `(R_t, t_t)` is the tracker pose
//! and `(R_l, t_l)` the lighthouse pose, both in the reference frame. The
//! horizontal rotor measures `atan(x / z)`, the vertical one `atan(y / z)`.

use nalgebra::{RealField, Vector3};

use crate::math::so3::{quat_conjugate, quat_from_array, quat_from_axis_angle, quat_rotate};
use crate::{iso_to_array7, Axis, Iso3, MotorCalibration, Real, Vec3, POSE_DIM};

/// Lighthouse pose packed as `[qx, qy, qz, qw, tx, ty, tz]`.
pub type LighthouseArray = [f64; 7];

/// Pack a lighthouse pose for use inside the generic model.
pub fn lighthouse_array(pose: &Iso3) -> LighthouseArray {
    iso_to_array7(pose)
}

/// Sensor position in the lighthouse frame, generic over the scalar.
///
/// `translation` and `axis_angle` describe the tracker in the reference
/// frame; the lighthouse pose and the sensor position are constants.
pub fn sensor_in_lighthouse_generic<T: RealField>(
    translation: &Vector3<T>,
    axis_angle: &Vector3<T>,
    lighthouse: &LighthouseArray,
    sensor: &[f64; 3],
) -> Vector3<T> {
    let p_t = Vector3::new(
        T::from_f64(sensor[0]).unwrap(),
        T::from_f64(sensor[1]).unwrap(),
        T::from_f64(sensor[2]).unwrap(),
    );
    let t_l = Vector3::new(
        T::from_f64(lighthouse[4]).unwrap(),
        T::from_f64(lighthouse[5]).unwrap(),
        T::from_f64(lighthouse[6]).unwrap(),
    );
    let q_l: [f64; 4] = [lighthouse[0], lighthouse[1], lighthouse[2], lighthouse[3]];
    let q_l_inv = quat_conjugate(&quat_from_array::<T>(&q_l));

    let p_ref = quat_rotate(&quat_from_axis_angle(axis_angle), &p_t) + translation - t_l;
    quat_rotate(&q_l_inv, &p_ref)
}

/// Sweep angle of a lighthouse-frame point, with optional rotor correction.
///
/// With correction, `θ' = θ + phase + tan(tilt)·o + curve·o² + gib_mag·sin(gib_phase + θ)`
/// where `o` is the normalized coordinate along the other axis.
pub fn sweep_angle_generic<T: RealField>(
    p_l: &Vector3<T>,
    axis: Axis,
    motor: Option<&[f64; 5]>,
) -> T {
    let x = p_l.x.clone() / p_l.z.clone();
    let y = p_l.y.clone() / p_l.z.clone();
    let (own, other) = match axis {
        Axis::Horizontal => (x, y),
        Axis::Vertical => (y, x),
    };
    let theta = own.atan();
    let Some(m) = motor else {
        return theta;
    };
    let phase = T::from_f64(m[0]).unwrap();
    let tilt = T::from_f64(m[1]).unwrap();
    let gib_phase = T::from_f64(m[2]).unwrap();
    let gib_mag = T::from_f64(m[3]).unwrap();
    let curve = T::from_f64(m[4]).unwrap();
    theta.clone()
        + phase
        + tilt.tan() * other.clone()
        + curve * other.clone() * other
        + gib_mag * (gib_phase + theta).sin()
}

/// Predicted sweep angle for a tracker pose, generic over the scalar.
pub fn predict_angle_generic<T: RealField>(
    translation: &Vector3<T>,
    axis_angle: &Vector3<T>,
    lighthouse: &LighthouseArray,
    sensor: &[f64; 3],
    axis: Axis,
    motor: Option<&[f64; 5]>,
) -> T {
    let p_l = sensor_in_lighthouse_generic(translation, axis_angle, lighthouse, sensor);
    sweep_angle_generic(&p_l, axis, motor)
}

/// Sensor position in the lighthouse frame for an `f64` pose.
pub fn sensor_in_lighthouse(tracker: &[Real; POSE_DIM], lighthouse: &Iso3, sensor: &Vec3) -> Vec3 {
    sensor_in_lighthouse_generic(
        &Vec3::new(tracker[0], tracker[1], tracker[2]),
        &Vec3::new(tracker[3], tracker[4], tracker[5]),
        &lighthouse_array(lighthouse),
        &[sensor.x, sensor.y, sensor.z],
    )
}

/// Predicted sweep angle, `None` when the sensor is at or behind the lighthouse plane.
pub fn predict_angle(
    tracker: &[Real; POSE_DIM],
    lighthouse: &Iso3,
    sensor: &Vec3,
    axis: Axis,
    motor: Option<&MotorCalibration>,
) -> Option<Real> {
    let p_l = sensor_in_lighthouse(tracker, lighthouse, sensor);
    if p_l.z <= 0.0 {
        return None;
    }
    let motor = motor.map(MotorCalibration::to_array);
    Some(sweep_angle_generic(&p_l, axis, motor.as_ref()))
}
