//! Calibration of the offset between the tracking frame and a reference system.
//!
//! Tracked poses (from this system) and reference poses (from an external
//! motion-capture system) are collected into pairs, then aligned with the
//! closed-form hand-eye estimator and optionally refined.
//!
//! In continuous mode a pair is formed whenever the two streams report poses
//! close enough in time, and kept only if the body moved or turned enough
//! since the last kept pair. In steps mode poses are buffered until
//! [`HiveOffset::next_pose`] averages each buffer into one pair.

use anyhow::Result;
use hive_core::{rotation_distance, Iso3, OffsetTransform, StampedPose, Timestamp};
use hive_linear::{average_poses, estimate_offset, AlignmentError};
use hive_optim::refine_offset;
use log::{debug, info};

use crate::config::OffsetConfig;

/// Source of a pose fed to the calibrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseSource {
    /// Pose estimated by this system.
    Tracked,
    /// Pose reported by the external reference system.
    Reference,
}

/// Frame-alignment calibrator session.
#[derive(Debug, Clone)]
pub struct HiveOffset {
    config: OffsetConfig,
    tracked: Vec<Iso3>,
    reference: Vec<Iso3>,
    /// Latest unpaired pose of each stream (continuous mode).
    pending_tracked: Option<StampedPose>,
    pending_reference: Option<StampedPose>,
    /// Poses of the current waypoint (steps mode).
    step_tracked: Vec<Iso3>,
    step_reference: Vec<Iso3>,
}

impl HiveOffset {
    pub fn new(config: OffsetConfig) -> Self {
        Self {
            config,
            tracked: Vec::new(),
            reference: Vec::new(),
            pending_tracked: None,
            pending_reference: None,
            step_tracked: Vec::new(),
            step_reference: Vec::new(),
        }
    }

    pub fn config(&self) -> &OffsetConfig {
        &self.config
    }

    /// Number of committed pairs.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Committed `(tracked, reference)` sequences.
    pub fn pairs(&self) -> (&[Iso3], &[Iso3]) {
        (&self.tracked, &self.reference)
    }

    /// Feed a pose estimated by this system.
    pub fn add_vive_pose(&mut self, stamp: Timestamp, pose: Iso3) {
        self.add_pose(PoseSource::Tracked, stamp, pose);
    }

    /// Feed a pose reported by the reference system.
    pub fn add_optitrack_pose(&mut self, stamp: Timestamp, pose: Iso3) {
        self.add_pose(PoseSource::Reference, stamp, pose);
    }

    pub fn add_pose(&mut self, source: PoseSource, stamp: Timestamp, pose: Iso3) {
        if self.config.steps {
            match source {
                PoseSource::Tracked => self.step_tracked.push(pose),
                PoseSource::Reference => self.step_reference.push(pose),
            }
            return;
        }

        match source {
            PoseSource::Tracked => self.pending_tracked = Some((stamp, pose)),
            PoseSource::Reference => self.pending_reference = Some((stamp, pose)),
        }
        let (Some((t_stamp, tracked)), Some((r_stamp, reference))) =
            (self.pending_tracked, self.pending_reference)
        else {
            return;
        };
        let gap = t_stamp.secs_since(r_stamp).abs();
        if gap > self.config.time_thresh.as_secs_f64() {
            return;
        }
        self.pending_tracked = None;
        self.pending_reference = None;
        if self.moved_enough(&tracked) {
            self.commit(tracked, reference);
        } else {
            debug!("pose pair skipped: too close to the previous pair");
        }
    }

    fn moved_enough(&self, tracked: &Iso3) -> bool {
        let Some(last) = self.tracked.last() else {
            return true;
        };
        let distance = (tracked.translation.vector - last.translation.vector).norm();
        let angle = rotation_distance(&tracked.rotation, &last.rotation);
        distance > self.config.distance_thresh || angle > self.config.angle_thresh
    }

    fn commit(&mut self, tracked: Iso3, reference: Iso3) {
        self.tracked.push(tracked);
        self.reference.push(reference);
    }

    /// Close the current waypoint: average both buffers into one pair.
    ///
    /// Fails without committing when either buffer is empty; both buffers are
    /// cleared only on success.
    pub fn next_pose(&mut self) -> Result<(), AlignmentError> {
        let tracked = average_poses(&self.step_tracked).ok_or(AlignmentError::Empty)?;
        let reference = average_poses(&self.step_reference).ok_or(AlignmentError::Empty)?;
        info!(
            "waypoint {} committed from {} tracked and {} reference poses",
            self.tracked.len(),
            self.step_tracked.len(),
            self.step_reference.len()
        );
        self.step_tracked.clear();
        self.step_reference.clear();
        self.commit(tracked, reference);
        Ok(())
    }

    /// Offset candidates from the committed pairs.
    ///
    /// The closed-form estimate comes first, followed by the refined one when
    /// refinement is enabled.
    pub fn get_offset(&self) -> Result<Vec<OffsetTransform>> {
        estimate_offsets(&self.tracked, &self.reference, &self.config)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// Offset candidates for two equally long pose sequences.
pub fn estimate_offsets(
    tracked: &[Iso3],
    reference: &[Iso3],
    config: &OffsetConfig,
) -> Result<Vec<OffsetTransform>> {
    let closed_form = estimate_offset(tracked, reference, &config.handeye_options())?;
    let mut candidates = vec![closed_form];
    if config.refine {
        let refined = refine_offset(tracked, reference, &candidates[0], &config.refine_options())?;
        candidates.push(refined);
    }
    Ok(candidates)
}
