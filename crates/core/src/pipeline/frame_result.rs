use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::liveness::domain::blink_liveness::Liveness;
use crate::recognition::domain::face_recognizer::Identity;
use crate::shared::bounding_box::BoundingBox;
use crate::tracking::domain::face_slot::SlotId;

/// Per-face outcome for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceVerdict {
    pub slot_id: SlotId,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub liveness: Liveness,
    pub identity: Identity,
    /// Live and recognized.
    pub admitted: bool,
    pub color: &'static str,
}

impl FaceVerdict {
    pub fn new(
        slot_id: SlotId,
        bbox: BoundingBox,
        confidence: f64,
        liveness: Liveness,
        identity: Identity,
    ) -> Self {
        Self {
            slot_id,
            bbox,
            confidence,
            admitted: liveness.is_live() && identity.is_known(),
            color: liveness.color_hint(),
            liveness,
            identity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameResult {
    pub frame_index: usize,
    /// Milliseconds since the run started.
    pub elapsed_ms: f64,
    pub captured_at: DateTime<Utc>,
    pub faces: Vec<FaceVerdict>,
}

impl FrameResult {
    pub fn admitted(&self) -> impl Iterator<Item = &FaceVerdict> {
        self.faces.iter().filter(|f| f.admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Liveness::Live, Identity::Known("ada".into()), true)]
    #[case(Liveness::Live, Identity::Unknown, false)]
    #[case(Liveness::NotLive, Identity::Known("ada".into()), false)]
    #[case(Liveness::NotLive, Identity::Unknown, false)]
    fn test_admitted_requires_live_and_known(
        #[case] liveness: Liveness,
        #[case] identity: Identity,
        #[case] expected: bool,
    ) {
        let v = FaceVerdict::new(1, BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9, liveness, identity);
        assert_eq!(v.admitted, expected);
    }

    #[test]
    fn test_serializes_labels_and_colour() {
        let v = FaceVerdict::new(
            3,
            BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            0.75,
            Liveness::NotLive,
            Identity::Unknown,
        );
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["slot_id"], 3);
        assert_eq!(json["liveness"], "Not Live");
        assert_eq!(json["identity"], "Unknown");
        assert_eq!(json["color"], "red");
        assert_eq!(json["admitted"], false);
        assert_eq!(json["bbox"]["width"], 3.0);
    }
}
