//! Slot tracker reconciling detector boxes and landmark meshes.
//!
//! The two models run independently and their output order means nothing,
//! so both are tied to slots spatially. Landmark boxes drive slot identity
//! and liveness; detections are matched to the surviving slots afterwards
//! and decide which slots are reported for the frame.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::face_slot::{Slot, SlotId};
use crate::detection::domain::eye_geometry::face_eye_aspect_ratio;
use crate::detection::domain::face_detector::Detection;
use crate::detection::domain::face_landmarks::LandmarkSet;
use crate::liveness::domain::blink_liveness::{Liveness, LivenessConfig};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::math::greedy_match;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub match_iou_threshold: f64,
    pub detection_iou_threshold: f64,
    pub max_missed_frames: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_iou_threshold: 0.3,
            detection_iou_threshold: 0.3,
            max_missed_frames: 5,
        }
    }
}

/// A slot reported for this frame because a detection landed on it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotCandidate {
    pub slot_id: SlotId,
    pub detection_index: usize,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

pub struct SlotTracker {
    slots: Vec<Slot>,
    next_id: SlotId,
    tracker: TrackerConfig,
    liveness: LivenessConfig,
}

impl SlotTracker {
    pub fn new(tracker: TrackerConfig, liveness: LivenessConfig) -> Self {
        Self {
            slots: Vec::new(),
            next_id: 1,
            tracker,
            liveness,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id() == id)
    }

    /// Verdict for `id` at `now`; unknown ids are never live.
    pub fn liveness(&self, id: SlotId, now: Instant) -> Liveness {
        self.slot(id)
            .map(|s| s.liveness(now, &self.liveness))
            .unwrap_or(Liveness::NotLive)
    }

    /// Advances the slot set by one frame and returns the slots that have a
    /// detection this frame.
    pub fn update(
        &mut self,
        detections: &[Detection],
        landmarks: &[LandmarkSet],
        frame_width: u32,
        frame_height: u32,
        now: Instant,
    ) -> Vec<SlotCandidate> {
        let observations = observe_landmarks(landmarks, frame_width, frame_height);

        let num_existing = self.slots.len();
        let matched = self.match_landmarks(&observations, now);
        self.create_slots(&observations, &matched, now);
        self.age_unmatched_slots(num_existing, &matched);

        self.match_detections(detections, frame_width, frame_height)
    }

    /// Matches detections to the current slots without changing any slot.
    pub fn match_detections(
        &self,
        detections: &[Detection],
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<SlotCandidate> {
        let det_boxes: Vec<BoundingBox> = detections
            .iter()
            .map(|d| d.to_pixels(frame_width, frame_height))
            .collect();
        let slot_corners: Vec<[f64; 4]> =
            self.slots.iter().map(|s| s.last_bbox().corners()).collect();
        let det_corners: Vec<[f64; 4]> = det_boxes.iter().map(|b| b.corners()).collect();

        let mut candidates: Vec<SlotCandidate> = greedy_match(
            &slot_corners,
            &det_corners,
            self.tracker.detection_iou_threshold,
        )
        .into_iter()
        .map(|(si, di)| SlotCandidate {
            slot_id: self.slots[si].id(),
            detection_index: di,
            bbox: det_boxes[di],
            confidence: detections[di].score,
        })
        .collect();

        if candidates.len() < detections.len() {
            log::debug!(
                "{} detection(s) matched no slot",
                detections.len() - candidates.len()
            );
        }
        candidates.sort_by_key(|c| c.detection_index);
        candidates
    }

    /// Feeds matched observations into their slots and reports which
    /// observations and slots were paired.
    fn match_landmarks(&mut self, observations: &[Observation], now: Instant) -> MatchFlags {
        let slot_corners: Vec<[f64; 4]> =
            self.slots.iter().map(|s| s.last_bbox().corners()).collect();
        let obs_corners: Vec<[f64; 4]> = observations.iter().map(|o| o.bbox.corners()).collect();

        let mut flags = MatchFlags {
            observations: vec![false; observations.len()],
            slots: vec![false; self.slots.len()],
        };
        for (si, oi) in greedy_match(&slot_corners, &obs_corners, self.tracker.match_iou_threshold)
        {
            let obs = &observations[oi];
            let slot = &mut self.slots[si];
            if slot.matched(obs.bbox, obs.ear, now, &self.liveness) {
                log::debug!("Slot {} blinked", slot.id());
            }
            flags.observations[oi] = true;
            flags.slots[si] = true;
        }
        flags
    }

    fn create_slots(&mut self, observations: &[Observation], matched: &MatchFlags, now: Instant) {
        for (obs, _) in observations
            .iter()
            .zip(&matched.observations)
            .filter(|&(_, &m)| !m)
        {
            let mut slot = Slot::new(self.next_id, obs.bbox);
            slot.matched(obs.bbox, obs.ear, now, &self.liveness);
            log::debug!("Slot {} created at {:?}", slot.id(), obs.bbox);
            self.slots.push(slot);
            self.next_id += 1;
        }
    }

    fn age_unmatched_slots(&mut self, num_existing: usize, matched: &MatchFlags) {
        for (slot, _) in self
            .slots
            .iter_mut()
            .take(num_existing)
            .zip(&matched.slots)
            .filter(|&(_, &m)| !m)
        {
            slot.missed();
        }
        let max_missed = self.tracker.max_missed_frames;
        self.slots.retain(|s| {
            let keep = s.missed_frames() <= max_missed;
            if !keep {
                log::debug!("Slot {} evicted", s.id());
            }
            keep
        });
    }
}

struct Observation {
    bbox: BoundingBox,
    ear: Option<f64>,
}

struct MatchFlags {
    observations: Vec<bool>,
    slots: Vec<bool>,
}

/// Pixel boxes and EARs for every landmark set that has any points.
fn observe_landmarks(
    landmarks: &[LandmarkSet],
    frame_width: u32,
    frame_height: u32,
) -> Vec<Observation> {
    landmarks
        .iter()
        .filter_map(|lm| {
            let bbox = lm.bounding_box(frame_width, frame_height)?;
            let ear = match face_eye_aspect_ratio(lm) {
                Ok(ear) => Some(ear),
                Err(e) => {
                    log::debug!("Skipping liveness sample: {e}");
                    None
                }
            };
            Some(Observation { bbox, ear })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::eye_geometry::fixtures::face_with_ear;
    use std::time::Duration;

    const W: u32 = 1000;
    const H: u32 = 1000;
    const OPEN: f64 = 0.35;
    const CLOSED: f64 = 0.15;

    fn tracker() -> SlotTracker {
        SlotTracker::new(TrackerConfig::default(), LivenessConfig::default())
    }

    fn face(left: f64, ear: f64) -> LandmarkSet {
        face_with_ear(left, 0.2, 0.2, ear)
    }

    fn detection_for(lm: &LandmarkSet, score: f64) -> Detection {
        let b = lm.bounding_box(W, H).unwrap();
        Detection::new(
            b.x / W as f64,
            b.y / H as f64,
            b.width / W as f64,
            b.height / H as f64,
            score,
        )
    }

    #[test]
    fn test_new_faces_get_fresh_slots() {
        let mut t = tracker();
        let now = Instant::now();
        let a = face(0.1, OPEN);
        let b = face(0.6, OPEN);
        let candidates = t.update(
            &[detection_for(&a, 0.9), detection_for(&b, 0.8)],
            &[a, b],
            W,
            H,
            now,
        );
        assert_eq!(t.slots().len(), 2);
        let ids: Vec<SlotId> = candidates.iter().map(|c| c.slot_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(candidates[1].confidence, 0.8);
    }

    #[test]
    fn test_slot_persists_under_gradual_motion() {
        let mut t = tracker();
        let start = Instant::now();
        for i in 0..40 {
            let lm = face(0.1 + i as f64 * 0.01, OPEN);
            t.update(&[], &[lm], W, H, start + Duration::from_millis(33 * i));
        }
        assert_eq!(t.slots().len(), 1);
        assert_eq!(t.slots()[0].id(), 1);
    }

    #[test]
    fn test_slot_evicted_after_max_missed_frames() {
        let mut t = tracker();
        let now = Instant::now();
        t.update(&[], &[face(0.1, OPEN)], W, H, now);
        for _ in 0..5 {
            t.update(&[], &[], W, H, now);
        }
        assert_eq!(t.slots().len(), 1);
        assert_eq!(t.slots()[0].missed_frames(), 5);

        t.update(&[], &[], W, H, now);
        assert!(t.slots().is_empty());
    }

    #[test]
    fn test_ids_never_reused_after_eviction() {
        let mut t = tracker();
        let now = Instant::now();
        t.update(&[], &[face(0.1, OPEN)], W, H, now);
        for _ in 0..6 {
            t.update(&[], &[], W, H, now);
        }
        t.update(&[], &[face(0.1, OPEN)], W, H, now);
        assert_eq!(t.slots().len(), 1);
        assert_eq!(t.slots()[0].id(), 2);
    }

    #[test]
    fn test_reappearing_face_within_window_keeps_slot() {
        let mut t = tracker();
        let now = Instant::now();
        t.update(&[], &[face(0.1, OPEN)], W, H, now);
        for _ in 0..3 {
            t.update(&[], &[], W, H, now);
        }
        t.update(&[], &[face(0.1, OPEN)], W, H, now);
        assert_eq!(t.slots()[0].id(), 1);
        assert_eq!(t.slots()[0].missed_frames(), 0);
    }

    #[test]
    fn test_blink_is_tracked_per_slot() {
        let mut t = tracker();
        let start = Instant::now();
        let step = Duration::from_millis(33);
        // Left face blinks, right face keeps eyes open.
        let ears = [OPEN, CLOSED, CLOSED, CLOSED, OPEN];
        for (i, &ear) in ears.iter().enumerate() {
            t.update(
                &[],
                &[face(0.1, ear), face(0.6, OPEN)],
                W,
                H,
                start + step * i as u32,
            );
        }
        let now = start + step * 4;
        assert_eq!(t.liveness(1, now), Liveness::Live);
        assert_eq!(t.liveness(2, now), Liveness::NotLive);
        assert_eq!(t.slot(1).unwrap().last_blink_time(), Some(now));
    }

    #[test]
    fn test_blink_follows_face_when_mesh_order_flips() {
        let mut t = tracker();
        let start = Instant::now();
        let step = Duration::from_millis(33);
        let ears = [OPEN, CLOSED, CLOSED, CLOSED, OPEN];
        for (i, &ear) in ears.iter().enumerate() {
            let blinking = face(0.1, ear);
            let steady = face(0.6, OPEN);
            let landmarks = if i % 2 == 0 {
                [blinking, steady]
            } else {
                [steady, blinking]
            };
            t.update(&[], &landmarks, W, H, start + step * i as u32);
        }

        let now = start + step * 4;
        assert_eq!(t.slots().len(), 2);
        assert_eq!(t.liveness(1, now), Liveness::Live);
        assert_eq!(t.liveness(2, now), Liveness::NotLive);
        assert!(t.slot(1).unwrap().last_bbox().x < 200.0);
        assert!(t.slot(2).unwrap().last_bbox().x > 500.0);
    }

    #[test]
    fn test_degenerate_geometry_keeps_slot_but_skips_sample() {
        let mut t = tracker();
        let now = Instant::now();
        t.update(&[], &[face(0.1, CLOSED)], W, H, now);
        assert_eq!(t.slots()[0].consecutive_low_ear(), 1);

        // Collapse the eye corners: box unchanged, EAR undefined.
        let mut points = face(0.1, CLOSED).points().to_vec();
        for &i in &crate::detection::domain::eye_geometry::LEFT_EYE {
            points[i] = (0.2, 0.28);
        }
        t.update(&[], &[LandmarkSet::new(points)], W, H, now);
        assert_eq!(t.slots().len(), 1);
        assert_eq!(t.slots()[0].missed_frames(), 0);
        assert_eq!(t.slots()[0].consecutive_low_ear(), 1);
    }

    #[test]
    fn test_detection_without_slot_is_not_a_candidate() {
        let mut t = tracker();
        let now = Instant::now();
        let lm = face(0.1, OPEN);
        let stray = Detection::new(0.7, 0.7, 0.1, 0.1, 0.9);
        let candidates = t.update(&[stray, detection_for(&lm, 0.9)], &[lm], W, H, now);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].detection_index, 1);
    }

    #[test]
    fn test_slot_without_detection_persists_silently() {
        let mut t = tracker();
        let now = Instant::now();
        let candidates = t.update(&[], &[face(0.1, OPEN)], W, H, now);
        assert!(candidates.is_empty());
        assert_eq!(t.slots().len(), 1);
    }

    #[test]
    fn test_match_detections_does_not_age_slots() {
        let mut t = tracker();
        let now = Instant::now();
        let lm = face(0.1, OPEN);
        t.update(&[], &[lm.clone()], W, H, now);
        for _ in 0..10 {
            let c = t.match_detections(&[detection_for(&lm, 0.9)], W, H);
            assert_eq!(c.len(), 1);
        }
        assert_eq!(t.slots()[0].missed_frames(), 0);
    }

    #[test]
    fn test_empty_landmark_set_is_ignored() {
        let mut t = tracker();
        t.update(&[], &[LandmarkSet::new(Vec::new())], W, H, Instant::now());
        assert!(t.slots().is_empty());
    }

    #[test]
    fn test_unknown_slot_is_not_live() {
        let t = tracker();
        assert_eq!(t.liveness(42, Instant::now()), Liveness::NotLive);
    }
}
