//! Frame alignment by hand-eye calibration (AX = XB) using Tsai–Lenz.
//!
//! Two systems observe the same rigid motion: the lighthouse tracker reports
//! `tracked_i` in its own frame and an external reference system reports
//! `reference_i` for a marker on the same body. They are related by
//!
//! `reference_i = frame * tracked_i * body`
//!
//! Relative motions `A = tracked_i⁻¹ tracked_j` and `B = reference_i⁻¹ reference_j`
//! satisfy `A * body = body * B`, which Tsai–Lenz solves for `body`. The frame
//! offset then follows by averaging `reference_i * body⁻¹ * tracked_i⁻¹`.

use hive_core::{Iso3, OffsetMethod, OffsetTransform, Real};
use log::debug;
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3,
};
use thiserror::Error;

use crate::average::average_poses;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("pose sequences are empty")]
    Empty,
    #[error("inconsistent pose sequence sizes: tracked {tracked} vs reference {reference}")]
    LengthMismatch { tracked: usize, reference: usize },
    #[error("need at least 2 poses, got {0}")]
    NotEnoughPoses(usize),
    #[error("no valid motion pairs after filtering")]
    NoMotionPairs,
    #[error("svd failed during hand-eye estimation")]
    SvdFailed,
    #[error("linear solve failed during hand-eye estimation")]
    LinearSolveFailed,
}

/// Motion pair for Tsai–Lenz:
/// A: relative motion of the tracker in the tracking frame,
/// B: relative motion of the marker in the reference frame.
#[derive(Debug, Clone, Copy)]
pub struct MotionPair {
    pub rot_a: Matrix3<Real>,
    pub rot_b: Matrix3<Real>,
    pub tra_a: Vector3<Real>,
    pub tra_b: Vector3<Real>,
}

/// Pair selection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandEyeOptions {
    /// Discard relative motions rotating less than this (degrees).
    pub min_angle_deg: Real,
    /// Reject pairs whose rotation angles in the two chains differ by more
    /// than this (degrees). Both chains see the same physical rotation.
    pub max_angle_mismatch_deg: Real,
}

impl Default for HandEyeOptions {
    fn default() -> Self {
        Self {
            min_angle_deg: 1.0,
            max_angle_mismatch_deg: 2.0,
        }
    }
}

fn make_motion_pair(
    tracked_a: &Iso3,
    reference_a: &Iso3,
    tracked_b: &Iso3,
    reference_b: &Iso3,
) -> Result<MotionPair, AlignmentError> {
    let motion_a = tracked_a.inverse() * tracked_b;
    let motion_b = reference_a.inverse() * reference_b;

    Ok(MotionPair {
        rot_a: project_to_so3(*motion_a.rotation.to_rotation_matrix().matrix())?,
        rot_b: project_to_so3(*motion_b.rotation.to_rotation_matrix().matrix())?,
        tra_a: motion_a.translation.vector,
        tra_b: motion_b.translation.vector,
    })
}

fn is_good_pair(pair: &MotionPair, opts: &HandEyeOptions) -> bool {
    let alpha = log_so3(&pair.rot_a);
    let beta = log_so3(&pair.rot_b);
    let norm_a = alpha.norm();
    let norm_b = beta.norm();
    let min_rot = norm_a.min(norm_b);

    if min_rot < opts.min_angle_deg.to_radians() {
        debug!("motion pair rejected: small rotation {:.3} deg", min_rot.to_degrees());
        return false;
    }

    let mismatch = (norm_a - norm_b).abs();
    if mismatch > opts.max_angle_mismatch_deg.to_radians() {
        debug!("motion pair rejected: angle mismatch {:.3} deg", mismatch.to_degrees());
        return false;
    }

    true
}

/// Build all valid motion pairs from two equally long pose sequences.
pub fn build_all_pairs(
    tracked: &[Iso3],
    reference: &[Iso3],
    opts: &HandEyeOptions,
) -> Result<Vec<MotionPair>, AlignmentError> {
    check_sequences(tracked, reference)?;

    let n = tracked.len();
    let mut pairs = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..(n - 1) {
        for j in (i + 1)..n {
            let pair = make_motion_pair(&tracked[i], &reference[i], &tracked[j], &reference[j])?;
            if is_good_pair(&pair, opts) {
                pairs.push(pair);
            } else {
                debug!("skipping pair ({},{})", i, j);
            }
        }
    }

    if pairs.is_empty() {
        return Err(AlignmentError::NoMotionPairs);
    }
    Ok(pairs)
}

fn check_sequences(tracked: &[Iso3], reference: &[Iso3]) -> Result<(), AlignmentError> {
    if tracked.is_empty() && reference.is_empty() {
        return Err(AlignmentError::Empty);
    }
    if tracked.len() != reference.len() {
        return Err(AlignmentError::LengthMismatch {
            tracked: tracked.len(),
            reference: reference.len(),
        });
    }
    if tracked.len() < 2 {
        return Err(AlignmentError::NotEnoughPoses(tracked.len()));
    }
    Ok(())
}

fn quat_left(q: &UnitQuaternion<Real>) -> nalgebra::Matrix4<Real> {
    let w = q.w;
    let (x, y, z) = (q.i, q.j, q.k);
    nalgebra::Matrix4::new(w, -x, -y, -z, x, w, -z, y, y, z, w, -x, z, -y, x, w)
}

fn quat_right(q: &UnitQuaternion<Real>) -> nalgebra::Matrix4<Real> {
    let w = q.w;
    let (x, y, z) = (q.i, q.j, q.k);
    nalgebra::Matrix4::new(w, -x, -y, -z, x, w, z, -y, y, -z, w, x, z, y, -x, w)
}

fn to_unit_quaternion(m: &Matrix3<Real>) -> UnitQuaternion<Real> {
    UnitQuaternion::from_rotation_matrix(&nalgebra::Rotation3::from_matrix_unchecked(*m))
}

/// Rotation of `X` from `q_a q_x = q_x q_b` stacked over all pairs.
fn estimate_rotation(pairs: &[MotionPair]) -> Result<Matrix3<Real>, AlignmentError> {
    let mut m = DMatrix::<Real>::zeros(4 * pairs.len(), 4);
    for (idx, p) in pairs.iter().enumerate() {
        let qa = to_unit_quaternion(&p.rot_a);
        let qb = to_unit_quaternion(&p.rot_b);
        m.view_mut((4 * idx, 0), (4, 4))
            .copy_from(&(quat_left(&qa) - quat_right(&qb)));
    }

    let svd = m.svd(false, true);
    let v_t = svd.v_t.ok_or(AlignmentError::SvdFailed)?;
    let q_vec = v_t.row(v_t.nrows() - 1);
    let q = Quaternion::new(q_vec[0], q_vec[1], q_vec[2], q_vec[3]).normalize();
    Ok(UnitQuaternion::from_quaternion(q)
        .to_rotation_matrix()
        .into_inner())
}

/// Translation of `X` from `(R_A - I) t_X = R_X t_B - t_A`.
fn estimate_translation(
    pairs: &[MotionPair],
    rot_x: &Matrix3<Real>,
) -> Result<Vector3<Real>, AlignmentError> {
    let mut mat_c = DMatrix::<Real>::zeros(3 * pairs.len(), 3);
    let mut vec_w = DVector::<Real>::zeros(3 * pairs.len());
    for (idx, p) in pairs.iter().enumerate() {
        mat_c
            .view_mut((3 * idx, 0), (3, 3))
            .copy_from(&(p.rot_a - Matrix3::identity()));
        vec_w
            .rows_mut(3 * idx, 3)
            .copy_from(&(rot_x * p.tra_b - p.tra_a));
    }
    ridge_llsq(&mat_c, &vec_w, 1e-12)
}

/// Tsai–Lenz estimate of the tracker-to-marker transform `body`.
pub fn estimate_body_tsai_lenz(
    tracked: &[Iso3],
    reference: &[Iso3],
    opts: &HandEyeOptions,
) -> Result<Iso3, AlignmentError> {
    let pairs = build_all_pairs(tracked, reference, opts)?;
    debug!("hand-eye: {} motion pairs", pairs.len());

    let rot_x = estimate_rotation(&pairs)?;
    let tra_x = estimate_translation(&pairs, &rot_x)?;
    Ok(Isometry3::from_parts(
        Translation3::from(tra_x),
        to_unit_quaternion(&rot_x),
    ))
}

/// Frame offset given `body`: average of `reference_i * body⁻¹ * tracked_i⁻¹`.
pub fn estimate_frame(
    tracked: &[Iso3],
    reference: &[Iso3],
    body: &Iso3,
) -> Result<Iso3, AlignmentError> {
    if tracked.len() != reference.len() {
        return Err(AlignmentError::LengthMismatch {
            tracked: tracked.len(),
            reference: reference.len(),
        });
    }
    let body_inv = body.inverse();
    let samples: Vec<Iso3> = tracked
        .iter()
        .zip(reference)
        .map(|(t, r)| r * body_inv * t.inverse())
        .collect();
    average_poses(&samples).ok_or(AlignmentError::Empty)
}

/// Closed-form offset: Tsai–Lenz for `body`, then the averaged `frame`.
pub fn estimate_offset(
    tracked: &[Iso3],
    reference: &[Iso3],
    opts: &HandEyeOptions,
) -> Result<OffsetTransform, AlignmentError> {
    let body = estimate_body_tsai_lenz(tracked, reference, opts)?;
    let frame = estimate_frame(tracked, reference, &body)?;
    Ok(OffsetTransform {
        frame,
        body,
        method: OffsetMethod::ClosedForm,
        cost: None,
    })
}

/// Closest rotation matrix in the Frobenius sense.
fn project_to_so3(m: Matrix3<Real>) -> Result<Matrix3<Real>, AlignmentError> {
    let svd = m.svd(true, true);
    let u = svd.u.ok_or(AlignmentError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(AlignmentError::SvdFailed)?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    Ok(r)
}

fn log_so3(r: &Matrix3<Real>) -> Vector3<Real> {
    let rot = to_unit_quaternion(r);
    let angle = rot.angle();
    if angle < 1e-12 {
        return Vector3::zeros();
    }
    let axis: Unit<Vector3<Real>> = rot.axis().unwrap_or_else(Vector3::x_axis);
    axis.into_inner() * angle
}

/// min ||A x - b||² + λ ||x||²
fn ridge_llsq(
    a: &DMatrix<Real>,
    b: &DVector<Real>,
    lambda: Real,
) -> Result<Vector3<Real>, AlignmentError> {
    let (m, n) = a.shape();
    if n != 3 {
        return Err(AlignmentError::LinearSolveFailed);
    }
    let mut a_aug = DMatrix::<Real>::zeros(m + n, n);
    a_aug.view_mut((0, 0), (m, n)).copy_from(a);
    let sqrt_lambda = lambda.sqrt();
    for i in 0..n {
        a_aug[(m + i, i)] = sqrt_lambda;
    }
    let mut b_aug = DVector::<Real>::zeros(m + n);
    b_aug.rows_mut(0, m).copy_from(b);

    let x = a_aug
        .svd(true, true)
        .solve(&b_aug, 1e-12)
        .map_err(|_| AlignmentError::LinearSolveFailed)?;
    Ok(Vector3::new(x[0], x[1], x[2]))
}
