use hive_core::math::so3::{
    quat_conjugate, quat_from_array, quat_from_axis_angle, quat_log, quat_mul, quat_rotate,
};
use nalgebra::{DVectorView, RealField, SVector, Vector3};

/// Constants of one tracked/reference pose pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentData {
    /// Tracked pose `[qx, qy, qz, qw, tx, ty, tz]`.
    pub tracked: [f64; 7],
    /// Reference pose `[qx, qy, qz, qw, tx, ty, tz]`.
    pub reference: [f64; 7],
    pub angle_factor: f64,
}

fn split7<T: RealField>(p: &[f64; 7]) -> (nalgebra::Quaternion<T>, Vector3<T>) {
    let q = quat_from_array::<T>(&[p[0], p[1], p[2], p[3]]);
    let t = Vector3::new(
        T::from_f64(p[4]).unwrap(),
        T::from_f64(p[5]).unwrap(),
        T::from_f64(p[6]).unwrap(),
    );
    (q, t)
}

fn split6<T: RealField>(p: &DVectorView<'_, T>) -> (nalgebra::Quaternion<T>, Vector3<T>) {
    let t = Vector3::new(p[0].clone(), p[1].clone(), p[2].clone());
    let w = Vector3::new(p[3].clone(), p[4].clone(), p[5].clone());
    (quat_from_axis_angle(&w), t)
}

/// 6D residual `[t_pred - t_ref, angle_factor · log(q_predᵀ q_ref)]` for
/// `pred = frame * tracked * body`.
pub fn alignment_residual_generic<T: RealField>(
    frame: DVectorView<'_, T>,
    body: DVectorView<'_, T>,
    data: &AlignmentData,
) -> SVector<T, 6> {
    let (q_f, t_f) = split6(&frame);
    let (q_b, t_b) = split6(&body);
    let (q_v, t_v) = split7::<T>(&data.tracked);
    let (q_r, t_r) = split7::<T>(&data.reference);

    let q_pred = quat_mul(&quat_mul(&q_f, &q_v), &q_b);
    let t_pred = t_f + quat_rotate(&q_f, &(t_v + quat_rotate(&q_v, &t_b)));

    let r_t = t_pred - t_r;
    let r_q = quat_log(&quat_mul(&quat_conjugate(&q_pred), &q_r))
        * T::from_f64(data.angle_factor).unwrap();

    let mut out = SVector::<T, 6>::zeros();
    for k in 0..3 {
        out[k] = r_t[k].clone();
        out[3 + k] = r_q[k].clone();
    }
    out
}
