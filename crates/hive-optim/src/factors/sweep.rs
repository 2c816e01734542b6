use hive_core::{models::predict_angle_generic, Axis};
use nalgebra::{DVectorView, RealField, SVector, Vector3};

/// Constants of one sweep-angle observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepData {
    pub sensor: [f64; 3],
    pub lighthouse: [f64; 7],
    pub axis: Axis,
    pub angle: f64,
    pub motor: Option<[f64; 5]>,
}

/// Residual `measured - predicted` for a 6D tracker pose block.
pub fn sweep_residual_generic<T: RealField>(
    pose: DVectorView<'_, T>,
    data: &SweepData,
) -> SVector<T, 1> {
    let translation = Vector3::new(pose[0].clone(), pose[1].clone(), pose[2].clone());
    let axis_angle = Vector3::new(pose[3].clone(), pose[4].clone(), pose[5].clone());
    let predicted = predict_angle_generic(
        &translation,
        &axis_angle,
        &data.lighthouse,
        &data.sensor,
        data.axis,
        data.motor.as_ref(),
    );
    SVector::<T, 1>::new(T::from_f64(data.angle).unwrap() - predicted)
}
