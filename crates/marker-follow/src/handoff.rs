//! Pose handoff between the frame path and the tick path.

use marker_follow_core::TrackedPose;
use nalgebra::Point2;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Copy of the shared pose state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PoseSnapshot {
    pub pose: TrackedPose,
    /// Center of the last accepted detection.
    pub last_known: Point2<f64>,
    pub marker_visible: bool,
    /// A pose is waiting to be applied.
    pub transform_dirty: bool,
    /// Number of accepted detections so far.
    pub generation: u64,
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self {
            pose: TrackedPose::default(),
            last_known: Point2::origin(),
            marker_visible: false,
            transform_dirty: false,
            generation: 0,
        }
    }
}

/// Written by the frame path, read and cleared by the tick path.
#[derive(Debug, Default)]
pub struct PoseHandoff {
    state: Mutex<PoseSnapshot>,
}

impl PoseHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PoseSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an accepted detection; returns its generation.
    pub fn publish_found(&self, pose: TrackedPose) -> u64 {
        let mut state = self.lock();
        state.pose = pose;
        state.last_known = pose.center;
        state.marker_visible = true;
        state.transform_dirty = true;
        state.generation += 1;
        state.generation
    }

    /// Record a frame without the tracked marker. The pending flag is kept.
    pub fn publish_lost(&self) {
        let mut state = self.lock();
        state.pose = state.pose.with_center(state.last_known);
        state.marker_visible = false;
    }

    pub fn take(&self) -> PoseSnapshot {
        *self.lock()
    }

    /// Clear the pending flag if no detection was published since
    /// `generation` was read. Returns whether the flag was cleared.
    pub fn clear_if(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.transform_dirty = false;
        true
    }
}
