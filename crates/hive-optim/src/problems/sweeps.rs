//! Sweep residuals shared by the single-frame and window problems.

use hive_core::{lighthouse_array, Environment, Extrinsics, LighthouseMap, ObservationBatch};
use log::trace;

use crate::ir::{FactorKind, ParamId, ProblemIR, ResidualBlock, RobustLoss};

/// Everything held constant while fitting a tracker pose to sweep angles.
#[derive(Debug, Clone, Copy)]
pub struct SweepModel<'a> {
    pub extrinsics: &'a Extrinsics,
    pub environment: &'a Environment,
    /// Rotor calibrations, consulted only with motor correction enabled.
    pub lighthouses: &'a LighthouseMap,
    pub use_motor_correction: bool,
}

impl<'a> SweepModel<'a> {
    pub fn new(
        extrinsics: &'a Extrinsics,
        environment: &'a Environment,
        lighthouses: &'a LighthouseMap,
    ) -> Self {
        Self {
            extrinsics,
            environment,
            lighthouses,
            use_motor_correction: false,
        }
    }

    pub fn with_motor_correction(mut self, enabled: bool) -> Self {
        self.use_motor_correction = enabled;
        self
    }

    /// Add one sweep residual per usable sample of `batch` on `pose`.
    ///
    /// Sweeps from lighthouses missing in the environment and samples from
    /// unknown sensors are skipped. Returns the number of residuals added.
    pub fn add_residuals(
        &self,
        ir: &mut ProblemIR,
        pose: ParamId,
        batch: &ObservationBatch,
        loss: RobustLoss,
    ) -> usize {
        let mut added = 0;
        for sweep in &batch.sweeps {
            let Some(lh_pose) = self.environment.lighthouse_pose(&sweep.lighthouse) else {
                trace!("lighthouse {} has no calibrated pose", sweep.lighthouse);
                continue;
            };
            let lighthouse = lighthouse_array(lh_pose);
            let motor = if self.use_motor_correction {
                self.lighthouses
                    .get(&sweep.lighthouse)
                    .map(|lh| lh.motor(sweep.axis).to_array())
            } else {
                None
            };
            for sample in &sweep.samples {
                let position = sample.sensor_id().and_then(|id| self.extrinsics.position(id));
                let Some(p) = position else {
                    continue;
                };
                if !sample.angle.is_finite() {
                    continue;
                }
                ir.add_residual_block(ResidualBlock::new(
                    vec![pose],
                    loss,
                    FactorKind::SweepAngle {
                        sensor: [p.x, p.y, p.z],
                        lighthouse,
                        axis: sweep.axis,
                        angle: sample.angle,
                        motor,
                    },
                ));
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FixedMask;
    use hive_core::synthetic::scene::{observe_all, sphere_tracker, two_lighthouse_environment};
    use hive_core::synthetic::noise::UniformNoise;
    use hive_core::{Axis, Iso3, LightMeasurement, LightSample, Timestamp};

    #[test]
    fn skips_unknown_lighthouses_and_sensors() {
        let tracker = sphere_tracker("LHR-T", 12, 0.05);
        let extrinsics = Extrinsics::from_tracker(&tracker).unwrap();
        let env = two_lighthouse_environment("vive");
        let lighthouses = LighthouseMap::new();
        let model = SweepModel::new(&extrinsics, &env, &lighthouses);

        let pose = Iso3::translation(0.0, 0.0, 1.0);
        let mut sweeps = observe_all(
            &tracker,
            &pose,
            &env,
            Timestamp::from_millis(5),
            &UniformNoise::new(1, 0.0),
        );
        let expected: usize = sweeps.iter().map(|s| s.samples.len()).sum();
        sweeps.push(LightMeasurement {
            lighthouse: "LHB-UNKNOWN".into(),
            axis: Axis::Horizontal,
            stamp: Timestamp::from_millis(5),
            samples: vec![LightSample::new(0, 0.1)],
        });
        sweeps[0].samples.push(LightSample::new(-1, 0.1));
        sweeps[0].samples.push(LightSample::new(31, 0.1));

        let mut ir = ProblemIR::new();
        let id = ir.add_param_block("pose", 6, FixedMask::all_free());
        let added = model.add_residuals(
            &mut ir,
            id,
            &ObservationBatch::from_sweeps(sweeps),
            RobustLoss::None,
        );
        assert_eq!(added, expected);
        assert_eq!(ir.sweep_residual_count(), expected);
    }
}
