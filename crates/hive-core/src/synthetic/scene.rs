//! Synthetic trackers, lighthouse placements and sweep observations.

use std::f64::consts::{FRAC_PI_3, PI};

use super::noise::UniformNoise;
use crate::{
    models::predict_angle, pose6_from_iso, Axis, Environment, ImuCalibration, Iso3,
    LightMeasurement, LightSample, Pt3, Sensor, SensorId, Timestamp, Tracker, Vec3,
    DEFAULT_PHOTODIODE_RADIUS,
};

/// `n` sensors spread over a sphere of the given radius (golden spiral).
///
/// Sensor ids are `0..n` and normals point outward.
pub fn sphere_sensors(n: usize, radius: f64) -> Vec<Sensor> {
    let golden = PI * (3.0 - 5f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - z * z).sqrt();
            let phi = golden * i as f64;
            let normal = Vec3::new(r * phi.cos(), r * phi.sin(), z);
            Sensor {
                id: i as SensorId,
                position: normal * radius,
                normal,
            }
        })
        .collect()
}

/// Tracker with [`sphere_sensors`].
pub fn sphere_tracker(serial: &str, n: usize, radius: f64) -> Tracker {
    Tracker {
        serial: serial.to_string(),
        sensors: sphere_sensors(n, radius)
            .into_iter()
            .map(|s| (s.id, s))
            .collect(),
        imu: ImuCalibration::default(),
        radius: DEFAULT_PHOTODIODE_RADIUS,
    }
}

/// Lighthouse at `position` whose optical (+z) axis points at `target`.
pub fn lighthouse_looking_at(position: Vec3, target: Vec3) -> Iso3 {
    Iso3::face_towards(&Pt3::from(position), &Pt3::from(target), &Vec3::y())
}

/// Two lighthouses in opposite corners looking at the origin, the usual room setup.
pub fn two_lighthouse_environment(frame: &str) -> Environment {
    Environment::new(frame)
        .with_lighthouse(
            "LHB-A",
            lighthouse_looking_at(Vec3::new(-2.0, 1.5, -2.5), Vec3::zeros()),
        )
        .with_lighthouse(
            "LHB-B",
            lighthouse_looking_at(Vec3::new(2.0, 1.8, -2.0), Vec3::zeros()),
        )
}

/// Sweep of one lighthouse axis seen by a tracker at `tracker_pose`.
///
/// Sensors behind the lighthouse or outside its ±60° field are skipped.
/// `noise` is indexed by `(stream, sensor id)`.
#[allow(clippy::too_many_arguments)]
pub fn observe_axis(
    tracker: &Tracker,
    tracker_pose: &Iso3,
    lighthouse: &str,
    lighthouse_pose: &Iso3,
    axis: Axis,
    stamp: Timestamp,
    noise: &UniformNoise,
    stream: usize,
) -> LightMeasurement {
    let params = pose6_from_iso(tracker_pose);
    let samples = tracker
        .sensors
        .values()
        .filter_map(|s| {
            let angle = predict_angle(&params, lighthouse_pose, &s.position, axis, None)?;
            (angle.abs() < FRAC_PI_3).then(|| {
                LightSample::new(s.id as i32, angle + noise.sample(stream, s.id as usize))
            })
        })
        .collect();
    LightMeasurement {
        lighthouse: lighthouse.to_string(),
        axis,
        stamp,
        samples,
    }
}

/// Both axes of every lighthouse in `env`, all stamped `stamp`.
pub fn observe_all(
    tracker: &Tracker,
    tracker_pose: &Iso3,
    env: &Environment,
    stamp: Timestamp,
    noise: &UniformNoise,
) -> Vec<LightMeasurement> {
    let mut out = Vec::new();
    for (k, (serial, pose)) in env.lighthouses.iter().enumerate() {
        for axis in Axis::ALL {
            let stream = 2 * k + axis.index();
            out.push(observe_axis(
                tracker, tracker_pose, serial, pose, axis, stamp, noise, stream,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso_from_parts;

    #[test]
    fn sphere_layout_has_unit_normals_and_radius() {
        let sensors = sphere_sensors(16, 0.05);
        assert_eq!(sensors.len(), 16);
        for s in &sensors {
            assert!((s.normal.norm() - 1.0).abs() < 1e-12);
            assert!((s.position.norm() - 0.05).abs() < 1e-12);
        }
    }

    #[test]
    fn lighthouse_looks_at_target() {
        let lh = lighthouse_looking_at(Vec3::new(-2.0, 1.5, -2.5), Vec3::zeros());
        let target_in_lh = lh.inverse() * Pt3::origin();
        assert!(target_in_lh.x.abs() < 1e-9 && target_in_lh.y.abs() < 1e-9);
        assert!(target_in_lh.z > 0.0);
    }

    #[test]
    fn observations_cover_both_axes_of_every_lighthouse() {
        let tracker = sphere_tracker("LHR-T", 20, 0.05);
        let env = two_lighthouse_environment("vive");
        let pose = iso_from_parts(&Vec3::new(0.1, 0.0, 0.2), &Vec3::new(0.0, 0.3, 0.0));
        let obs = observe_all(&tracker, &pose, &env, Timestamp::from_millis(5), &UniformNoise::default());
        assert_eq!(obs.len(), 4);
        for m in &obs {
            assert_eq!(m.samples.len(), 20);
            assert_eq!(m.stamp, Timestamp::from_millis(5));
        }
    }
}
