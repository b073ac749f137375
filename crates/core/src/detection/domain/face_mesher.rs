use super::face_landmarks::LandmarkSet;
use crate::shared::frame::Frame;

/// Domain interface for dense face landmarking.
///
/// Returns one `LandmarkSet` per face found, in no particular order. The
/// order carries no relation to any detector's output.
pub trait FaceMesher: Send {
    fn mesh(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>>;
}
