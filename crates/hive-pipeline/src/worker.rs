//! Per-tracker worker thread.
//!
//! A [`TrackerContext`] owns one estimator on a dedicated thread. Samples are
//! queued to it over a bounded channel and processed in arrival order; the
//! newest pose the estimator produces is parked in a shared slot where the
//! caller picks it up once.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use hive_core::{ImuSample, LightMeasurement, TransformStamped};
use log::{debug, warn};
use thiserror::Error;

use crate::solver::PoseSolver;

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WorkerError {
    #[error("tracker worker has stopped")]
    Disconnected,
}

enum Message {
    Light(LightMeasurement),
    Imu(ImuSample),
    /// Acknowledged once every earlier message has been processed.
    Sync(Sender<()>),
}

type SharedPose = Arc<Mutex<Option<TransformStamped>>>;

/// Handle to an estimator running on its own thread.
///
/// Dropping the context closes the queue and waits for the worker to drain it.
pub struct TrackerContext {
    name: String,
    sender: Option<Sender<Message>>,
    latest: SharedPose,
    handle: Option<JoinHandle<()>>,
}

impl TrackerContext {
    /// Move `solver` onto a new worker thread named after `name`.
    pub fn spawn<S>(name: impl Into<String>, solver: S) -> Result<Self>
    where
        S: PoseSolver + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = bounded(QUEUE_CAPACITY);
        let latest = SharedPose::default();
        let slot = latest.clone();
        let handle = thread::Builder::new()
            .name(format!("hive-{name}"))
            .spawn(move || run(solver, receiver, slot))
            .with_context(|| format!("failed to spawn worker for {name}"))?;
        debug!("{name}: worker started");
        Ok(Self {
            name,
            sender: Some(sender),
            latest,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn process_light(&self, measurement: LightMeasurement) -> Result<(), WorkerError> {
        self.send(Message::Light(measurement))
    }

    pub fn process_imu(&self, sample: ImuSample) -> Result<(), WorkerError> {
        self.send(Message::Imu(sample))
    }

    /// Block until every sample queued so far has been processed.
    pub fn sync(&self) -> Result<(), WorkerError> {
        let (ack, done) = bounded(1);
        self.send(Message::Sync(ack))?;
        done.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Newest pose not yet taken, or `None`.
    pub fn get_transform(&self) -> Option<TransformStamped> {
        lock(&self.latest).take()
    }

    fn send(&self, message: Message) -> Result<(), WorkerError> {
        let sender = self.sender.as_ref().ok_or(WorkerError::Disconnected)?;
        sender.send(message).map_err(|_| WorkerError::Disconnected)
    }
}

impl Drop for TrackerContext {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{}: worker panicked", self.name);
            }
        }
    }
}

impl std::fmt::Debug for TrackerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerContext")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn run<S: PoseSolver>(mut solver: S, receiver: Receiver<Message>, slot: SharedPose) {
    for message in receiver.iter() {
        match message {
            Message::Light(measurement) => solver.process_light(&measurement),
            Message::Imu(sample) => solver.process_imu(&sample),
            Message::Sync(ack) => {
                let _ = ack.send(());
                continue;
            }
        }
        if let Some(transform) = solver.get_transform() {
            *lock(&slot) = Some(transform);
        }
    }
}

fn lock(slot: &SharedPose) -> MutexGuard<'_, Option<TransformStamped>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::{Axis, SolvedPose, Timestamp, Vec3};

    /// Publishes one pose per light sample, stamped with the sample time.
    #[derive(Default)]
    struct Echo {
        pending: Option<TransformStamped>,
    }

    impl PoseSolver for Echo {
        fn process_light(&mut self, measurement: &LightMeasurement) {
            let mut pose = SolvedPose::canonical();
            pose.valid = true;
            pose.stamp = measurement.stamp;
            self.pending = Some(TransformStamped::from_pose(&pose, "world", "echo"));
        }

        fn process_imu(&mut self, _sample: &ImuSample) {}

        fn get_transform(&mut self) -> Option<TransformStamped> {
            self.pending.take()
        }
    }

    fn light(ms: u64) -> LightMeasurement {
        LightMeasurement {
            lighthouse: "LHB-1".into(),
            axis: Axis::Horizontal,
            stamp: Timestamp::from_millis(ms),
            samples: Vec::new(),
        }
    }

    #[test]
    fn newest_pose_is_handed_out_once() {
        let context = TrackerContext::spawn("echo", Echo::default()).unwrap();
        assert!(context.get_transform().is_none());

        context.process_light(light(1)).unwrap();
        context.process_light(light(2)).unwrap();
        context
            .process_imu(ImuSample {
                stamp: Timestamp::from_millis(3),
                accel: Vec3::zeros(),
                gyro: Vec3::zeros(),
            })
            .unwrap();
        context.sync().unwrap();

        let transform = context.get_transform().unwrap();
        assert_eq!(transform.stamp, Timestamp::from_millis(2));
        assert!(context.get_transform().is_none());
    }

    #[test]
    fn drop_joins_the_worker() {
        let context = TrackerContext::spawn("echo", Echo::default()).unwrap();
        for ms in 0..100 {
            context.process_light(light(ms)).unwrap();
        }
        drop(context);
    }
}
