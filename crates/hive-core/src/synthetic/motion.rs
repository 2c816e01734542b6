//! Smooth trajectories with matching inertial readings, and paired pose
//! sequences for frame-alignment tests.

use nalgebra::{Translation3, UnitQuaternion};

use super::noise::UniformNoise;
use crate::{ImuSample, Iso3, StampedPose, Timestamp, Vec3};

/// Motion with constant linear velocity (reference frame) and constant
/// angular rate (body frame).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantMotion {
    pub start: Iso3,
    pub velocity: Vec3,
    pub angular_rate: Vec3,
    pub gravity: Vec3,
}

impl ConstantMotion {
    /// Pose at `t` seconds after the start.
    pub fn pose_at(&self, t: f64) -> Iso3 {
        let rotation = self.start.rotation * UnitQuaternion::from_scaled_axis(self.angular_rate * t);
        let translation = self.start.translation.vector + self.velocity * t;
        Iso3::from_parts(Translation3::from(translation), rotation)
    }

    /// Ideal IMU reading at `t`: specific force `Rᵀ(a - g)` with `a = 0`.
    pub fn imu_at(&self, t: f64, stamp: Timestamp) -> ImuSample {
        let rotation = self.pose_at(t).rotation;
        ImuSample {
            stamp,
            accel: rotation.inverse_transform_vector(&(-self.gravity)),
            gyro: self.angular_rate,
        }
    }
}


/// Paired tracked/reference sequences related by `reference = frame * tracked * body`.
///
/// Tracked poses sweep through varied orientations so every relative motion
/// has a well-defined rotation axis. Reference poses get translation noise
/// and small rotation noise (radians) from `noise`.
pub fn paired_sequences(
    frame: &Iso3,
    body: &Iso3,
    n: usize,
    period_ms: u64,
    noise: &UniformNoise,
    rotation_noise: f64,
) -> (Vec<StampedPose>, Vec<StampedPose>) {
    let rot_noise = UniformNoise::new(noise.seed ^ 0x5bd1_e995, rotation_noise);
    let mut tracked = Vec::with_capacity(n);
    let mut reference = Vec::with_capacity(n);
    for i in 0..n {
        let s = i as f64;
        let stamp = Timestamp::from_millis(i as u64 * period_ms);
        let pose = Iso3::from_parts(
            Translation3::new(0.3 * (0.7 * s).sin(), 0.2 * (0.4 * s).cos(), 1.5 + 0.1 * s.sin()),
            UnitQuaternion::from_scaled_axis(Vec3::new(
                0.6 * (0.9 * s).sin(),
                0.5 * (0.5 * s + 1.0).cos(),
                0.7 * (0.3 * s).sin(),
            )),
        );
        let mut truth = frame * pose * body;
        truth.translation.vector += noise.sample_vec3(0, i);
        truth.rotation = UnitQuaternion::from_scaled_axis(rot_noise.sample_vec3(1, i)) * truth.rotation;
        tracked.push((stamp, pose));
        reference.push((stamp, truth));
    }
    (tracked, reference)
}
