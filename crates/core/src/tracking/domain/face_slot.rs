use std::time::Instant;

use crate::liveness::domain::blink_liveness::{BlinkState, Liveness, LivenessConfig};
use crate::shared::bounding_box::BoundingBox;

pub type SlotId = u32;

/// A tracked face: stable id, last known position and blink history.
///
/// Only the tracker mutates slots; everyone else reads snapshots.
#[derive(Clone, Debug)]
pub struct Slot {
    id: SlotId,
    last_bbox: BoundingBox,
    blink: BlinkState,
    missed_frames: u32,
}

impl Slot {
    pub(crate) fn new(id: SlotId, bbox: BoundingBox) -> Self {
        Self {
            id,
            last_bbox: bbox,
            blink: BlinkState::new(),
            missed_frames: 0,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn last_bbox(&self) -> BoundingBox {
        self.last_bbox
    }

    pub fn consecutive_low_ear(&self) -> u32 {
        self.blink.consecutive_low_ear()
    }

    pub fn last_blink_time(&self) -> Option<Instant> {
        self.blink.last_blink_time()
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn is_live(&self, now: Instant, config: &LivenessConfig) -> bool {
        self.blink.is_live(now, config)
    }

    pub fn liveness(&self, now: Instant, config: &LivenessConfig) -> Liveness {
        self.blink.verdict(now, config)
    }

    /// Records a landmark match. `ear` is `None` when the eye geometry was
    /// degenerate, in which case blink state is left alone. Returns `true`
    /// when the sample completed a blink.
    pub(crate) fn matched(
        &mut self,
        bbox: BoundingBox,
        ear: Option<f64>,
        now: Instant,
        config: &LivenessConfig,
    ) -> bool {
        self.last_bbox = bbox;
        self.missed_frames = 0;
        ear.is_some_and(|ear| self.blink.observe(ear, now, config))
    }

    pub(crate) fn missed(&mut self) {
        self.missed_frames = self.missed_frames.saturating_add(1);
    }
}
