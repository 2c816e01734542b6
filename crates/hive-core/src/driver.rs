//! Numeric conventions of the tracker driver boundary.
//!
//! The driver reports sweep angles as rotor ticks and IMU readings as raw
//! counts. These helpers turn them into radians, m/s² and rad/s.

use std::f64::consts::PI;

use crate::{ImuCalibration, ImuSample, Timestamp, Vec3};

/// Standard gravity (m/s²).
pub const GRAVITY: f64 = 9.80665;
/// Accelerometer counts per g.
pub const ACC_SCALE: f64 = 4096.0;
/// Gyroscope counts per degree per second.
pub const GYRO_SCALE: f64 = 32.768;
/// Rotor tick at the center of the sweep.
pub const SWEEP_CENTER_TICKS: f64 = 200_000.0;
/// Rotor ticks per half turn.
pub const SWEEP_HALF_TURN_TICKS: f64 = 400_000.0;

/// Convert a rotor tick count into a sweep angle (radians).
pub fn sweep_ticks_to_angle(ticks: u32) -> f64 {
    (PI / SWEEP_HALF_TURN_TICKS) * (ticks as f64 - SWEEP_CENTER_TICKS)
}

/// Convert raw accelerometer counts to m/s².
pub fn raw_accel(raw: [i16; 3]) -> Vec3 {
    Vec3::new(raw[0] as f64, raw[1] as f64, raw[2] as f64) * (GRAVITY / ACC_SCALE)
}

/// Convert raw gyroscope counts to rad/s.
pub fn raw_gyro(raw: [i16; 3]) -> Vec3 {
    Vec3::new(raw[0] as f64, raw[1] as f64, raw[2] as f64) * (PI / 180.0 / GYRO_SCALE)
}

/// Build a calibrated IMU sample from raw driver counts.
pub fn imu_from_raw(
    stamp: Timestamp,
    acc: [i16; 3],
    gyr: [i16; 3],
    calibration: &ImuCalibration,
) -> ImuSample {
    calibration.correct(&ImuSample {
        stamp,
        accel: raw_accel(acc),
        gyro: raw_gyro(gyr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sweep_center_is_zero_angle() {
        assert_eq!(sweep_ticks_to_angle(200_000), 0.0);
        assert_relative_eq!(sweep_ticks_to_angle(600_000), PI, epsilon = 1e-12);
        assert!((sweep_ticks_to_angle(0) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn one_g_reads_gravity() {
        let a = raw_accel([0, 0, 4096]);
        assert_relative_eq!(a.z, GRAVITY, epsilon = 1e-12);
        let w = raw_gyro([0, 0, (32768_i32 / 1000) as i16]);
        assert!(w.z > 0.0);
    }

    #[test]
    fn raw_imu_applies_calibration() {
        let cal = ImuCalibration {
            acc_bias: Vec3::new(0.0, 0.0, GRAVITY),
            ..ImuCalibration::default()
        };
        let s = imu_from_raw(Timestamp::from_millis(3), [0, 0, 4096], [0, 0, 0], &cal);
        assert!(s.accel.norm() < 1e-12);
        assert_eq!(s.stamp, Timestamp::from_millis(3));
    }
}
