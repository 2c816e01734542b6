//! Estimator that solves every complete batch on its own.

use hive_core::{
    Environment, ImuSample, LightMeasurement, LighthouseMap, SetupError, SolvedPose,
    TransformStamped, Tracker,
};
use hive_optim::{solve_single_frame, SolverOptions, SweepModel};
use log::debug;

use crate::config::EstimatorConfig;
use crate::observations::ObservationStore;
use crate::solver::{Calibration, PoseSolver, PublishSlot};

/// Single-frame estimator.
///
/// Keeps the latest sweep of each lighthouse axis and solves as soon as the
/// sweeping lighthouse has enough samples on both axes. Each solve starts
/// from the last accepted pose. Inertial samples are ignored.
#[derive(Debug, Clone)]
pub struct BaseSolver {
    calibration: Calibration,
    store: ObservationStore,
    options: SolverOptions,
    pose: SolvedPose,
    publish: PublishSlot,
    attempts: usize,
}

impl BaseSolver {
    pub fn new(
        tracker: &Tracker,
        environment: Environment,
        lighthouses: LighthouseMap,
        config: &EstimatorConfig,
    ) -> Result<Self, SetupError> {
        let calibration = Calibration::new(tracker, environment, lighthouses)?;
        Ok(Self {
            calibration,
            store: ObservationStore::new(config.observations.clone()),
            options: config.solver.clone(),
            pose: SolvedPose::from_params(&config.solver.start_pose),
            publish: PublishSlot::default(),
            attempts: 0,
        })
    }

    /// Current estimate, valid or not.
    pub fn pose(&self) -> &SolvedPose {
        &self.pose
    }

    /// Number of solves started so far.
    pub fn solve_attempts(&self) -> usize {
        self.attempts
    }

    pub fn observations(&self) -> &ObservationStore {
        &self.store
    }
}

impl PoseSolver for BaseSolver {
    fn process_light(&mut self, measurement: &LightMeasurement) {
        self.store.ingest(measurement, &self.calibration.extrinsics);
        self.store.evict_stale(measurement.stamp);
        if !self.store.is_solvable(&measurement.lighthouse) {
            return;
        }

        let batch = self.store.batch(measurement.stamp);
        let cal = &self.calibration;
        let model = SweepModel::new(&cal.extrinsics, &cal.environment, &cal.lighthouses);
        self.attempts += 1;
        match solve_single_frame(&mut self.pose, &batch, &model, &self.options) {
            Ok(_) => {
                let frame = &cal.environment.frame;
                self.publish
                    .publish(TransformStamped::from_pose(&self.pose, frame, &cal.serial));
            }
            Err(err) => debug!("{}: no pose from batch: {err:#}", cal.serial),
        }
    }

    fn process_imu(&mut self, _sample: &ImuSample) {}

    fn get_transform(&mut self) -> Option<TransformStamped> {
        self.publish.take()
    }
}
