//! Closed-form versus refined frame offsets on paired sequences.

use approx::assert_relative_eq;
use hive_core::synthetic::motion::paired_sequences;
use hive_core::synthetic::noise::UniformNoise;
use hive_core::{iso_from_parts, Iso3, OffsetMethod, Vec3};
use hive_linear::{estimate_offset, HandEyeOptions};
use hive_optim::problems::{offset_cost, refine_offset, OffsetRefineOptions};

fn ground_truth() -> (Iso3, Iso3) {
    let frame = iso_from_parts(&Vec3::new(1.2, -0.4, 0.3), &Vec3::new(0.1, -0.2, 1.4));
    let body = iso_from_parts(&Vec3::new(0.02, 0.05, -0.03), &Vec3::new(0.0, 0.15, -0.1));
    (frame, body)
}

fn split(seq: &[(hive_core::Timestamp, Iso3)]) -> Vec<Iso3> {
    seq.iter().map(|(_, p)| *p).collect()
}

#[test]
fn refinement_agrees_with_closed_form_and_lowers_cost() {
    let (frame_gt, body_gt) = ground_truth();
    let (tracked, reference) =
        paired_sequences(&frame_gt, &body_gt, 30, 100, &UniformNoise::new(3, 2e-3), 2e-3);
    let (tracked, reference) = (split(&tracked), split(&reference));

    let seed = estimate_offset(&tracked, &reference, &HandEyeOptions::default()).unwrap();
    let opts = OffsetRefineOptions::default();
    let refined = refine_offset(&tracked, &reference, &seed, &opts).unwrap();

    assert_eq!(seed.method, OffsetMethod::ClosedForm);
    assert_eq!(refined.method, OffsetMethod::Refined);

    for (name, candidate) in [("closed form", &seed), ("refined", &refined)] {
        let dt = (candidate.frame.translation.vector - frame_gt.translation.vector).norm();
        let dr = candidate.frame.rotation.angle_to(&frame_gt.rotation);
        assert!(dt < 3e-2, "{name}: frame translation error {dt:.3e}");
        assert!(dr < 1e-2, "{name}: frame rotation error {dr:.3e}");
        let db = (candidate.body.translation.vector - body_gt.translation.vector).norm();
        assert!(db < 3e-2, "{name}: body translation error {db:.3e}");
    }

    let seed_cost = offset_cost(&tracked, &reference, &seed, &opts).unwrap();
    let refined_cost = refined.cost.expect("refined offset carries its cost");
    assert!(
        refined_cost <= seed_cost + 1e-15,
        "refined cost {refined_cost:.3e} above seed {seed_cost:.3e}"
    );
}

#[test]
fn refinement_keeps_an_exact_seed() {
    let (frame_gt, body_gt) = ground_truth();
    let (tracked, reference) =
        paired_sequences(&frame_gt, &body_gt, 12, 100, &UniformNoise::new(5, 0.0), 0.0);
    let (tracked, reference) = (split(&tracked), split(&reference));
    let seed = hive_core::OffsetTransform {
        frame: frame_gt,
        body: body_gt,
        method: OffsetMethod::ClosedForm,
        cost: None,
    };
    let refined = refine_offset(&tracked, &reference, &seed, &OffsetRefineOptions::default())
        .unwrap();
    assert!(refined.cost.unwrap() < 1e-12);
    assert_relative_eq!(
        refined.frame.translation.vector,
        frame_gt.translation.vector,
        epsilon = 1e-6
    );
}

#[test]
fn mismatched_sequences_are_refused() {
    let (frame_gt, body_gt) = ground_truth();
    let seed = hive_core::OffsetTransform {
        frame: frame_gt,
        body: body_gt,
        method: OffsetMethod::ClosedForm,
        cost: None,
    };
    let tracked = vec![Iso3::identity(); 3];
    let reference = vec![Iso3::identity(); 2];
    assert!(refine_offset(&tracked, &reference, &seed, &OffsetRefineOptions::default()).is_err());
}
