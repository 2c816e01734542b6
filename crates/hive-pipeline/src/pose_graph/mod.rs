//! Windowed fusion of light and inertial data.
//!
//! Light batches that pass the observation gate become light states, seeded
//! by a single-frame solve. Inertial samples become inertial states predicted
//! from the newest state; consecutive inertial samples are merged into one
//! state. After every new state the whole window is re-solved and the newest
//! state is checked against the validity rules before it is published.

mod window;

pub use window::PoseWindow;

use hive_core::{
    renormalize_axis_angle, Environment, ImuSample, LightMeasurement, LighthouseMap, SetupError,
    SolvedPose, Timestamp, TransformStamped, Tracker,
};
use hive_optim::factors::inertial::Preintegration;
use hive_optim::problems::{optimize_pose_graph, WindowState};
use hive_optim::{
    solve_single_frame, PoseGraphOptions, PoseParams, SolverOptions, SweepModel, VelocityParams,
};
use log::{debug, trace};

use crate::config::EstimatorConfig;
use crate::observations::ObservationStore;
use crate::solver::{Calibration, PoseSolver, PublishSlot};

/// Sliding-window pose-graph estimator.
#[derive(Debug, Clone)]
pub struct PoseGraph {
    calibration: Calibration,
    store: ObservationStore,
    solver: SolverOptions,
    weights: PoseGraphOptions,
    window: PoseWindow,
    /// Start pose of single-frame solves while the window is empty.
    seed: SolvedPose,
    last_imu: Option<ImuSample>,
    last_pose_was_imu: bool,
    last_cost: Option<f64>,
    valid: bool,
    publish: PublishSlot,
}

impl PoseGraph {
    pub fn new(
        tracker: &Tracker,
        environment: Environment,
        lighthouses: LighthouseMap,
        config: &EstimatorConfig,
    ) -> Result<Self, SetupError> {
        let calibration = Calibration::new(tracker, environment, lighthouses)?;
        let mut solver = config.solver.clone();
        solver.use_motor_correction |= config.pose_graph.correction;
        Ok(Self {
            calibration,
            store: ObservationStore::new(config.observations.clone()),
            seed: SolvedPose::from_params(&solver.start_pose),
            solver,
            weights: config.pose_graph.weights.clone(),
            window: PoseWindow::new(config.pose_graph.window),
            last_imu: None,
            last_pose_was_imu: false,
            last_cost: None,
            valid: false,
            publish: PublishSlot::default(),
        })
    }

    pub fn window(&self) -> &PoseWindow {
        &self.window
    }

    /// Final cost of the last successful window solve.
    pub fn last_cost(&self) -> Option<f64> {
        self.last_cost
    }

    /// Whether the newest state passed the validity rules after the last solve.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn last_pose_was_imu(&self) -> bool {
        self.last_pose_was_imu
    }

    /// Inertial motion from the newest state to `stamp`, holding the last reading.
    fn motion_until(&self, stamp: Timestamp) -> Preintegration {
        let mut motion = Preintegration::default();
        if let (Some(imu), Some(back)) = (&self.last_imu, self.window.back()) {
            motion.integrate(&imu.accel, &imu.gyro, stamp.secs_since(back.stamp));
        }
        motion
    }

    fn predict(&self, from: &WindowState, motion: &Preintegration) -> (PoseParams, VelocityParams) {
        let (pose, velocity) =
            motion.predict(&from.pose.to_iso(), &from.velocity.0, &self.weights.gravity());
        (PoseParams::from_iso(&pose), VelocityParams(velocity))
    }

    fn resolve(&mut self) {
        let Some(anchor) = self.window.front().map(|s| s.pose) else {
            return;
        };
        let cal = &self.calibration;
        let model = SweepModel::new(&cal.extrinsics, &cal.environment, &cal.lighthouses);
        let result = match optimize_pose_graph(
            self.window.as_slice(),
            Some(&anchor),
            &model,
            &self.solver,
            &self.weights,
        ) {
            Ok(result) => result,
            Err(err) => {
                debug!("{}: window solve skipped: {err:#}", cal.serial);
                return;
            }
        };

        let solved = result.poses.iter().zip(&result.velocities);
        for (state, (pose, velocity)) in self.window.iter_mut().zip(solved) {
            state.pose = PoseParams {
                translation: pose.translation,
                rotation: renormalize_axis_angle(&pose.rotation),
            };
            state.velocity = *velocity;
        }
        self.last_cost = Some(result.final_cost);

        let Some(newest) = self.window.back() else {
            return;
        };
        let verdict =
            self.solver
                .validity
                .check(&newest.pose, result.final_cost, result.sweep_residuals);
        self.valid = verdict.is_ok();
        if self.valid {
            let mut pose = SolvedPose::from_params(&newest.pose.to_array());
            pose.valid = true;
            pose.stamp = newest.stamp;
            self.publish.publish(TransformStamped::from_pose(
                &pose,
                &cal.environment.frame,
                &cal.serial,
            ));
        }
    }
}

impl PoseSolver for PoseGraph {
    fn process_light(&mut self, measurement: &LightMeasurement) {
        self.store.ingest(measurement, &self.calibration.extrinsics);
        self.store.evict_stale(measurement.stamp);
        if !self.store.is_solvable(&measurement.lighthouse) {
            return;
        }
        let batch = self.store.batch(measurement.stamp);

        let motion = self.motion_until(measurement.stamp);
        let predicted = self.window.back().map(|back| self.predict(back, &motion));
        let mut candidate = match &predicted {
            Some((pose, _)) => SolvedPose::from_params(&pose.to_array()),
            None => self.seed,
        };

        let cal = &self.calibration;
        let model = SweepModel::new(&cal.extrinsics, &cal.environment, &cal.lighthouses);
        let (pose, velocity) = match solve_single_frame(&mut candidate, &batch, &model, &self.solver)
        {
            Ok(_) => {
                self.seed = candidate;
                let velocity = predicted.map(|(_, v)| v).unwrap_or_default();
                (PoseParams::from(&candidate), velocity)
            }
            Err(err) => {
                debug!("{}: single-frame seed failed: {err:#}", cal.serial);
                match predicted {
                    Some(prediction) => prediction,
                    None => return,
                }
            }
        };

        self.window.push(WindowState {
            stamp: measurement.stamp,
            pose,
            velocity,
            batch: Some(batch),
            motion,
        });
        self.last_pose_was_imu = false;
        self.resolve();
    }

    fn process_imu(&mut self, sample: &ImuSample) {
        let Some(back_stamp) = self.window.back().map(|s| s.stamp) else {
            self.last_imu = Some(*sample);
            return;
        };
        let dt = sample.stamp.secs_since(back_stamp);
        if dt <= 0.0 {
            trace!("inertial sample at {:?} is not newer than the window", sample.stamp);
            return;
        }
        let held = self.last_imu.replace(*sample).unwrap_or(*sample);

        if self.last_pose_was_imu {
            let previous = self.window.second_to_back().cloned();
            let gravity = self.weights.gravity();
            if let Some(back) = self.window.back_mut() {
                back.motion.integrate(&held.accel, &held.gyro, dt);
                back.stamp = sample.stamp;
                if let Some(prev) = previous {
                    let (pose, velocity) =
                        back.motion
                            .predict(&prev.pose.to_iso(), &prev.velocity.0, &gravity);
                    back.pose = PoseParams::from_iso(&pose);
                    back.velocity = VelocityParams(velocity);
                }
            }
        } else {
            let mut motion = Preintegration::default();
            motion.integrate(&held.accel, &held.gyro, dt);
            let Some(back) = self.window.back() else {
                return;
            };
            let (pose, velocity) = self.predict(back, &motion);
            self.window.push(WindowState {
                stamp: sample.stamp,
                pose,
                velocity,
                batch: None,
                motion,
            });
            self.last_pose_was_imu = true;
        }
        self.resolve();
    }

    fn get_transform(&mut self) -> Option<TransformStamped> {
        self.publish.take()
    }
}
