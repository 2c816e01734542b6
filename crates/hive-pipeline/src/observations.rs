//! Latest sweep per lighthouse and axis.
//!
//! Each lighthouse owns one timestamped slot per axis. A new sweep replaces
//! the slot of its axis; slots are emptied by [`ObservationStore::evict_stale`]
//! once they are at least `staleness` older than the given time.

use hive_core::{
    Axis, Extrinsics, LightMeasurement, LightSample, ObservationBatch, Timestamp,
};
use log::debug;
use std::collections::BTreeMap;

use crate::config::ObservationConfig;

#[derive(Debug, Clone, Default, PartialEq)]
struct AxisSlot {
    stamp: Timestamp,
    samples: Vec<LightSample>,
}

/// Per-lighthouse, per-axis store of accepted light samples.
#[derive(Debug, Clone)]
pub struct ObservationStore {
    config: ObservationConfig,
    slots: BTreeMap<String, [AxisSlot; 2]>,
}

impl ObservationStore {
    pub fn new(config: ObservationConfig) -> Self {
        Self {
            config,
            slots: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }

    /// Replace the slot of `measurement`'s lighthouse axis with its usable samples.
    ///
    /// Samples without a sensor, from sensors the tracker does not have, or
    /// with an angle outside the accepted range are dropped. Returns the
    /// number of samples kept.
    pub fn ingest(&mut self, measurement: &LightMeasurement, extrinsics: &Extrinsics) -> usize {
        let max_abs = self.config.max_abs_angle;
        let slot = &mut self
            .slots
            .entry(measurement.lighthouse.clone())
            .or_default()[measurement.axis.index()];
        slot.samples.clear();
        slot.stamp = measurement.stamp;

        let mut dropped = 0;
        for sample in &measurement.samples {
            let known = sample.sensor_id().is_some_and(|id| extrinsics.contains(id));
            if !known || !sample.angle.is_finite() || sample.angle.abs() > max_abs {
                dropped += 1;
                continue;
            }
            slot.samples.push(*sample);
        }
        if dropped > 0 {
            debug!(
                "{} {:?}: dropped {} of {} samples",
                measurement.lighthouse,
                measurement.axis,
                dropped,
                measurement.samples.len()
            );
        }
        slot.samples.len()
    }

    /// Empty every slot whose age at `now` reaches the staleness threshold.
    ///
    /// Returns the number of slots cleared.
    pub fn evict_stale(&mut self, now: Timestamp) -> usize {
        let staleness = self.config.staleness;
        let mut evicted = 0;
        for (serial, axes) in &mut self.slots {
            for (slot, axis) in axes.iter_mut().zip(Axis::ALL) {
                if slot.samples.is_empty() || now.saturating_since(slot.stamp) < staleness {
                    continue;
                }
                debug!(
                    "{serial} {axis:?}: evicted {} stale samples",
                    slot.samples.len()
                );
                slot.samples.clear();
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of samples currently held for one lighthouse axis.
    pub fn sample_count(&self, lighthouse: &str, axis: Axis) -> usize {
        self.slots
            .get(lighthouse)
            .map_or(0, |axes| axes[axis.index()].samples.len())
    }

    /// Whether both axes of `lighthouse` hold enough samples for a solve.
    pub fn is_solvable(&self, lighthouse: &str) -> bool {
        let min = self.config.min_samples_per_axis;
        Axis::ALL
            .iter()
            .all(|&axis| self.sample_count(lighthouse, axis) > min)
    }

    /// Batch of every lighthouse that has data on both axes, stamped `stamp`.
    pub fn batch(&self, stamp: Timestamp) -> ObservationBatch {
        let mut sweeps = Vec::new();
        for (serial, axes) in &self.slots {
            if axes.iter().any(|slot| slot.samples.is_empty()) {
                continue;
            }
            for (slot, axis) in axes.iter().zip(Axis::ALL) {
                sweeps.push(LightMeasurement {
                    lighthouse: serial.clone(),
                    axis,
                    stamp: slot.stamp,
                    samples: slot.samples.clone(),
                });
            }
        }
        ObservationBatch::new(stamp, sweeps)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
