//! Common interface of the tracker pose estimators.

use hive_core::{
    Environment, Extrinsics, ImuSample, LightMeasurement, LighthouseMap, SetupError,
    TransformStamped, Tracker,
};

/// A pose estimator fed by light and inertial streams.
///
/// Ingestion never fails: unusable samples are dropped and solver failures
/// only mean no new pose becomes available.
pub trait PoseSolver {
    fn process_light(&mut self, measurement: &LightMeasurement);

    fn process_imu(&mut self, sample: &ImuSample);

    /// Latest valid pose not yet delivered, or `None`.
    ///
    /// A pose is handed out once; the next call returns `None` until a newer
    /// pose has been computed.
    fn get_transform(&mut self) -> Option<TransformStamped>;
}

impl<S: PoseSolver + ?Sized> PoseSolver for Box<S> {
    fn process_light(&mut self, measurement: &LightMeasurement) {
        (**self).process_light(measurement)
    }

    fn process_imu(&mut self, sample: &ImuSample) {
        (**self).process_imu(sample)
    }

    fn get_transform(&mut self) -> Option<TransformStamped> {
        (**self).get_transform()
    }
}

/// Validated calibration inputs shared by both estimators.
#[derive(Debug, Clone)]
pub(crate) struct Calibration {
    pub serial: String,
    pub extrinsics: Extrinsics,
    pub environment: Environment,
    pub lighthouses: LighthouseMap,
}

impl Calibration {
    pub fn new(
        tracker: &Tracker,
        environment: Environment,
        lighthouses: LighthouseMap,
    ) -> Result<Self, SetupError> {
        let extrinsics = Extrinsics::from_tracker(tracker)?;
        environment.validate()?;
        for lighthouse in lighthouses.values() {
            lighthouse.validate()?;
        }
        Ok(Self {
            serial: tracker.serial.clone(),
            extrinsics,
            environment,
            lighthouses,
        })
    }
}

/// Single-slot delivery of poses to one consumer.
#[derive(Debug, Clone, Default)]
pub(crate) struct PublishSlot {
    pending: Option<TransformStamped>,
}

impl PublishSlot {
    pub fn publish(&mut self, transform: TransformStamped) {
        self.pending = Some(transform);
    }

    pub fn take(&mut self) -> Option<TransformStamped> {
        self.pending.take()
    }
}
