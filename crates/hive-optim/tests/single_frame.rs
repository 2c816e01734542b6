//! Single-frame solves against synthetic sweeps from two lighthouses.

use hive_core::synthetic::noise::UniformNoise;
use hive_core::synthetic::scene::{observe_all, sphere_tracker, two_lighthouse_environment};
use hive_core::{
    iso_from_parts, Environment, Extrinsics, LighthouseMap, ObservationBatch, SolvedPose,
    Timestamp, Tracker, Vec3,
};
use hive_optim::problems::{optimize_single_frame, solve_single_frame, SolverOptions, SweepModel};
use hive_optim::{PoseParams, Rejection};
use std::f64::consts::PI;

struct Scene {
    tracker: Tracker,
    extrinsics: Extrinsics,
    env: Environment,
    lighthouses: LighthouseMap,
}

fn scene() -> Scene {
    let tracker = sphere_tracker("LHR-TEST", 20, 0.06);
    let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
    Scene {
        tracker,
        extrinsics,
        env: two_lighthouse_environment("vive"),
        lighthouses: LighthouseMap::new(),
    }
}

fn batch_at(scene: &Scene, translation: Vec3, rotation: Vec3, noise: f64) -> ObservationBatch {
    let truth = iso_from_parts(&translation, &rotation);
    ObservationBatch::from_sweeps(observe_all(
        &scene.tracker,
        &truth,
        &scene.env,
        Timestamp::from_millis(120),
        &UniformNoise::new(7, noise),
    ))
}

#[test]
fn recovers_pose_from_canonical_start() {
    let scene = scene();
    let model = SweepModel::new(&scene.extrinsics, &scene.env, &scene.lighthouses);
    let t_gt = Vec3::new(0.05, -0.03, 1.1);
    let w_gt = Vec3::new(0.05, -0.08, 0.1);
    let batch = batch_at(&scene, t_gt, w_gt, 0.0);

    let mut pose = SolvedPose::canonical();
    let result = solve_single_frame(&mut pose, &batch, &model, &SolverOptions::default())
        .expect("solve should succeed");

    assert!(pose.valid);
    assert_eq!(pose.stamp, Timestamp::from_millis(120));
    assert_eq!(result.residuals, batch.sample_count());
    assert!(
        (pose.translation - t_gt).norm() < 1e-4,
        "translation error {:.2e}",
        (pose.translation - t_gt).norm()
    );
    assert!(
        (pose.rotation - w_gt).norm() < 1e-3,
        "rotation error {:.2e}",
        (pose.rotation - w_gt).norm()
    );
}

#[test]
fn small_noise_stays_valid() {
    let scene = scene();
    let model = SweepModel::new(&scene.extrinsics, &scene.env, &scene.lighthouses);
    let t_gt = Vec3::new(-0.1, 0.08, 1.05);
    let batch = batch_at(&scene, t_gt, Vec3::new(0.0, 0.1, 0.0), 2e-4);

    let mut pose = SolvedPose::canonical();
    solve_single_frame(&mut pose, &batch, &model, &SolverOptions::default()).unwrap();
    assert!(pose.valid);
    assert!((pose.translation - t_gt).norm() < 5e-2);
}

#[test]
fn pose_behind_reference_plane_is_rejected() {
    let scene = scene();
    let model = SweepModel::new(&scene.extrinsics, &scene.env, &scene.lighthouses);
    let batch = batch_at(&scene, Vec3::new(0.0, 0.0, -0.5), Vec3::zeros(), 0.0);

    let mut pose = SolvedPose::from_params(&[0.0, 0.0, -0.45, 0.0, 0.0, 0.0]);
    let before = pose;
    let err = solve_single_frame(&mut pose, &batch, &model, &SolverOptions::default())
        .expect_err("z <= 0 must be rejected");

    assert!(matches!(
        err.downcast_ref::<Rejection>(),
        Some(Rejection::TooShallow { .. })
    ));
    assert_eq!(pose, before);
}

#[test]
fn empty_batch_is_rejected_without_touching_pose() {
    let scene = scene();
    let model = SweepModel::new(&scene.extrinsics, &scene.env, &scene.lighthouses);
    let mut pose = SolvedPose::canonical();
    let before = pose;
    let err = solve_single_frame(
        &mut pose,
        &ObservationBatch::default(),
        &model,
        &SolverOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.downcast_ref::<Rejection>(), Some(&Rejection::NoResiduals));
    assert_eq!(pose, before);
}

#[test]
fn rotation_is_renormalized_into_half_turn() {
    let scene = scene();
    let model = SweepModel::new(&scene.extrinsics, &scene.env, &scene.lighthouses);
    let t_gt = Vec3::new(0.0, 0.0, 1.2);
    let w_gt = Vec3::new(0.0, 0.0, 0.3);
    let batch = batch_at(&scene, t_gt, w_gt, 0.0);

    // Same orientation expressed with a magnitude above π.
    let wrapped = Vec3::new(0.0, 0.0, 0.3 - 2.0 * PI);
    let mut pose = SolvedPose::from_params(&[0.0, 0.0, 1.2, wrapped.x, wrapped.y, wrapped.z]);
    solve_single_frame(&mut pose, &batch, &model, &SolverOptions::default()).unwrap();

    assert!(pose.rotation.norm() <= PI);
    assert!((pose.rotation - w_gt).norm() < 1e-3, "got {:?}", pose.rotation);
}

#[test]
fn exhausted_budget_still_returns_best_estimate() {
    let scene = scene();
    let model = SweepModel::new(&scene.extrinsics, &scene.env, &scene.lighthouses);
    let batch = batch_at(&scene, Vec3::new(0.02, 0.01, 1.05), Vec3::zeros(), 0.0);
    let opts = SolverOptions {
        time_budget: std::time::Duration::from_nanos(1),
        ..SolverOptions::default()
    };
    let start = PoseParams::from(&SolvedPose::canonical());
    let result = optimize_single_frame(&batch, &model, &start, &opts).unwrap();
    assert!(result.budget_exhausted);
    assert!(result.pose.is_finite());
}
