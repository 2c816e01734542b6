//! Window solves mixing sweep and inertial residuals.

use hive_core::synthetic::motion::ConstantMotion;
use hive_core::synthetic::noise::UniformNoise;
use hive_core::synthetic::scene::{observe_all, sphere_tracker, two_lighthouse_environment};
use hive_core::{Extrinsics, Iso3, LighthouseMap, ObservationBatch, Timestamp, Vec3};
use hive_optim::factors::inertial::Preintegration;
use hive_optim::problems::{
    build_pose_graph_ir, optimize_pose_graph, PoseGraphOptions, SolverOptions, SweepModel,
    WindowState,
};
use hive_optim::{PoseParams, VelocityParams};

const PERIOD: f64 = 0.02;
const IMU_STEPS: usize = 20;

fn motion() -> ConstantMotion {
    ConstantMotion {
        start: Iso3::translation(0.0, 0.05, 1.1),
        velocity: Vec3::new(0.2, 0.0, -0.1),
        angular_rate: Vec3::new(0.0, 0.3, 0.2),
        gravity: Vec3::new(0.0, 0.0, -9.80665),
    }
}

fn preintegrate(m: &ConstantMotion, t0: f64, t1: f64) -> Preintegration {
    let mut pre = Preintegration::default();
    let dt = (t1 - t0) / IMU_STEPS as f64;
    for k in 0..IMU_STEPS {
        let t = t0 + k as f64 * dt;
        let s = m.imu_at(t, Timestamp::from_secs_f64(t));
        pre.integrate(&s.accel, &s.gyro, dt);
    }
    pre
}

fn perturb(p: &PoseParams, k: usize) -> PoseParams {
    let noise = UniformNoise::new(31, 0.01);
    PoseParams {
        translation: p.translation + noise.sample_vec3(0, k),
        rotation: p.rotation + noise.sample_vec3(1, k),
    }
}

#[test]
fn window_recovers_light_and_inertial_states() {
    let tracker = sphere_tracker("LHR-PG", 20, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    let env = two_lighthouse_environment("vive");
    let lighthouses = LighthouseMap::new();
    let model = SweepModel::new(&extrinsics, &env, &lighthouses);
    let m = motion();

    // Light, inertial, light, inertial, light.
    let mut states = Vec::new();
    let mut truth = Vec::new();
    for k in 0..5 {
        let t = k as f64 * PERIOD;
        let pose_gt = PoseParams::from_iso(&m.pose_at(t));
        let batch = (k % 2 == 0).then(|| {
            ObservationBatch::from_sweeps(observe_all(
                &tracker,
                &m.pose_at(t),
                &env,
                Timestamp::from_secs_f64(t),
                &UniformNoise::new(k as u64, 0.0),
            ))
        });
        let motion = if k == 0 {
            Preintegration::default()
        } else {
            preintegrate(&m, t - PERIOD, t)
        };
        states.push(WindowState {
            stamp: Timestamp::from_secs_f64(t),
            pose: perturb(&pose_gt, k),
            velocity: VelocityParams(Vec3::zeros()),
            batch,
            motion,
        });
        truth.push(pose_gt);
    }

    let solver = SolverOptions {
        max_iters: 200,
        ..SolverOptions::default()
    };
    let result = optimize_pose_graph(
        &states,
        Some(&truth[0]),
        &model,
        &solver,
        &PoseGraphOptions::default(),
    )
    .expect("window solve");

    assert_eq!(result.poses.len(), 5);
    for (k, (est, gt)) in result.poses.iter().zip(&truth).enumerate() {
        let err = (est.translation - gt.translation).norm();
        assert!(err < 2e-3, "state {k}: translation error {err:.2e}");
    }
    let v_err = (result.velocities[2].0 - m.velocity).norm();
    assert!(v_err < 5e-2, "velocity error {v_err:.2e}");
}

#[test]
fn velocities_are_fixed_without_inertial_motion() {
    let tracker = sphere_tracker("LHR-PG", 12, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    let env = two_lighthouse_environment("vive");
    let lighthouses = LighthouseMap::new();
    let model = SweepModel::new(&extrinsics, &env, &lighthouses);
    let pose = Iso3::translation(0.0, 0.0, 1.0);
    let batch = ObservationBatch::from_sweeps(observe_all(
        &tracker,
        &pose,
        &env,
        Timestamp::from_millis(1),
        &UniformNoise::new(0, 0.0),
    ));
    let state = WindowState {
        stamp: Timestamp::from_millis(1),
        pose: PoseParams::from_iso(&pose),
        velocity: VelocityParams::default(),
        batch: Some(batch),
        motion: Preintegration::default(),
    };
    let states = vec![state.clone(), state];

    let (ir, initial) = build_pose_graph_ir(
        &states,
        None,
        &model,
        &SolverOptions::default(),
        &PoseGraphOptions::default(),
    )
    .unwrap();
    let vel = ir.param_by_name("vel/1").unwrap();
    assert!(ir.params[vel.0].fixed.is_all_fixed(3));
    assert_eq!(initial.len(), 4);
    // One smoothing factor, no prior without an anchor.
    assert_eq!(ir.residuals.len(), ir.sweep_residual_count() + 1);
}

#[test]
fn window_without_sweeps_is_refused() {
    let tracker = sphere_tracker("LHR-PG", 12, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    let env = two_lighthouse_environment("vive");
    let lighthouses = LighthouseMap::new();
    let model = SweepModel::new(&extrinsics, &env, &lighthouses);
    let state = WindowState {
        stamp: Timestamp::from_millis(1),
        pose: PoseParams::from_iso(&Iso3::translation(0.0, 0.0, 1.0)),
        velocity: VelocityParams::default(),
        batch: None,
        motion: Preintegration::default(),
    };
    let res = optimize_pose_graph(
        &[state],
        None,
        &model,
        &SolverOptions::default(),
        &PoseGraphOptions::default(),
    );
    assert!(res.is_err());
}

fn light_state(
    tracker: &hive_core::Tracker,
    env: &hive_core::Environment,
    m: &ConstantMotion,
    t: f64,
    noise: f64,
    seed: u64,
) -> WindowState {
    let pose_gt = m.pose_at(t);
    WindowState {
        stamp: Timestamp::from_secs_f64(t),
        pose: perturb(&PoseParams::from_iso(&pose_gt), seed as usize),
        velocity: VelocityParams::default(),
        batch: Some(ObservationBatch::from_sweeps(observe_all(
            tracker,
            &pose_gt,
            env,
            Timestamp::from_secs_f64(t),
            &UniformNoise::new(seed, noise),
        ))),
        motion: Preintegration::default(),
    }
}

#[test]
fn single_noisy_state_solves_without_velocity() {
    let tracker = sphere_tracker("LHR-PG", 20, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    let env = two_lighthouse_environment("vive");
    let lighthouses = LighthouseMap::new();
    let model = SweepModel::new(&extrinsics, &env, &lighthouses);
    let m = motion();
    let states = vec![light_state(&tracker, &env, &m, 0.0, 1e-4, 7)];
    let solver = SolverOptions::default();
    let opts = PoseGraphOptions::default();

    let (ir, initial) = build_pose_graph_ir(&states, None, &model, &solver, &opts).unwrap();
    assert!(ir.param_by_name("vel/0").is_none());
    assert_eq!(initial.len(), 1);

    let result = optimize_pose_graph(&states, None, &model, &solver, &opts).unwrap();
    assert_eq!(result.velocities[0], states[0].velocity);
    let err = (result.poses[0].translation - PoseParams::from_iso(&m.pose_at(0.0)).translation)
        .norm();
    assert!(err < 5e-3, "translation error {err:.2e}");
}

#[test]
fn zero_trust_leaves_inertial_states_alone() {
    let tracker = sphere_tracker("LHR-PG", 20, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    let env = two_lighthouse_environment("vive");
    let lighthouses = LighthouseMap::new();
    let model = SweepModel::new(&extrinsics, &env, &lighthouses);
    let m = motion();

    let inertial_pose = perturb(&PoseParams::from_iso(&m.pose_at(PERIOD)), 1);
    let states = vec![
        light_state(&tracker, &env, &m, 0.0, 1e-4, 3),
        WindowState {
            stamp: Timestamp::from_secs_f64(PERIOD),
            pose: inertial_pose,
            velocity: VelocityParams(m.velocity),
            batch: None,
            motion: preintegrate(&m, 0.0, PERIOD),
        },
        WindowState {
            motion: preintegrate(&m, PERIOD, 2.0 * PERIOD),
            ..light_state(&tracker, &env, &m, 2.0 * PERIOD, 1e-4, 4)
        },
    ];
    let solver = SolverOptions::default();
    let opts = PoseGraphOptions {
        trust: 0.0,
        ..PoseGraphOptions::default()
    };
    let anchor = states[0].pose;

    let (ir, _) = build_pose_graph_ir(&states, Some(&anchor), &model, &solver, &opts).unwrap();
    assert!(ir.param_by_name("pose/1").is_none());
    assert!((0..3).all(|k| ir.param_by_name(&format!("vel/{k}")).is_none()));

    let result = optimize_pose_graph(&states, Some(&anchor), &model, &solver, &opts).unwrap();
    assert_eq!(result.poses[1], inertial_pose);
    assert_eq!(result.velocities[1], VelocityParams(m.velocity));
    let gt = PoseParams::from_iso(&m.pose_at(2.0 * PERIOD));
    let err = (result.poses[2].translation - gt.translation).norm();
    assert!(err < 5e-3, "translation error {err:.2e}");
}

#[test]
fn trust_pulls_light_states_toward_inertial_rotation() {
    let tracker = sphere_tracker("LHR-PG", 20, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    let env = two_lighthouse_environment("vive");
    let lighthouses = LighthouseMap::new();
    let model = SweepModel::new(&extrinsics, &env, &lighthouses);
    let m = motion();
    let pre = preintegrate(&m, 0.0, PERIOD);
    let states = vec![
        light_state(&tracker, &env, &m, 0.0, 2e-3, 11),
        WindowState {
            motion: pre,
            ..light_state(&tracker, &env, &m, PERIOD, 2e-3, 12)
        },
    ];
    let solver = SolverOptions {
        max_iters: 200,
        ..SolverOptions::default()
    };

    // Disagreement between the solved relative rotation and the gyro.
    let deviation = |trust: f64| {
        let opts = PoseGraphOptions {
            trust,
            ..PoseGraphOptions::default()
        };
        let result = optimize_pose_graph(&states, None, &model, &solver, &opts).unwrap();
        let q_0 = result.poses[0].to_iso().rotation;
        let q_1 = result.poses[1].to_iso().rotation;
        (q_0 * pre.delta_q).angle_to(&q_1)
    };
    let light_only = deviation(0.0);
    let fused = deviation(100.0);
    assert!(light_only > 1e-5, "light-only deviation {light_only:.2e}");
    assert!(
        fused < 0.5 * light_only,
        "fused {fused:.2e} vs light-only {light_only:.2e}"
    );
}
