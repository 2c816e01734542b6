use nalgebra::{DVectorView, RealField, SVector};

/// `weight * (pose - anchor)` for a 6D pose block.
pub fn pose_prior_residual_generic<T: RealField>(
    pose: DVectorView<'_, T>,
    anchor: &[f64; 6],
    weight: f64,
) -> SVector<T, 6> {
    let w = T::from_f64(weight).unwrap();
    SVector::<T, 6>::from_fn(|i, _| (pose[i].clone() - T::from_f64(anchor[i]).unwrap()) * w.clone())
}
