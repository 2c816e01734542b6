//! Estimators running behind a tracker context.

use hive_core::synthetic::noise::UniformNoise;
use hive_core::synthetic::scene::{observe_all, sphere_tracker, two_lighthouse_environment};
use hive_core::{iso_from_parts, LighthouseMap, Timestamp, Vec3};
use hive_pipeline::{BaseSolver, EstimatorConfig, PoseGraph, PoseSolver, TrackerContext};

fn spawn(kind: &str) -> TrackerContext {
    let tracker = sphere_tracker("LHR-CTX", 20, 0.06);
    let env = two_lighthouse_environment("vive");
    let config = EstimatorConfig::default();
    let solver: Box<dyn PoseSolver + Send> = match kind {
        "graph" => Box::new(PoseGraph::new(&tracker, env, LighthouseMap::new(), &config).unwrap()),
        _ => Box::new(BaseSolver::new(&tracker, env, LighthouseMap::new(), &config).unwrap()),
    };
    TrackerContext::spawn(tracker.serial.clone(), solver).unwrap()
}

#[test]
fn both_estimators_publish_through_the_context() {
    let tracker = sphere_tracker("LHR-CTX", 20, 0.06);
    let truth = iso_from_parts(&Vec3::new(-0.05, 0.04, 1.2), &Vec3::new(0.02, 0.07, -0.05));
    let sweeps = observe_all(
        &tracker,
        &truth,
        &two_lighthouse_environment("vive"),
        Timestamp::from_millis(40),
        &UniformNoise::default(),
    );

    for kind in ["base", "graph"] {
        let context = spawn(kind);
        assert_eq!(context.name(), "LHR-CTX");
        for m in &sweeps {
            context.process_light(m.clone()).unwrap();
        }
        context.sync().unwrap();

        let transform = context.get_transform().expect("pose published");
        let err = (transform.translation - truth.translation.vector).norm();
        assert!(err < 1e-3, "{kind}: translation error {err:.2e}");
        assert!(context.get_transform().is_none());
    }
}
