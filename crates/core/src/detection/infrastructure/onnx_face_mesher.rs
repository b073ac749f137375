//! 468-point face mesh using ONNX Runtime.
//!
//! Two stages: a face detector proposes regions, then each region is
//! expanded to a square, resampled to 192x192 and passed through the
//! landmark model. Landmarks come back in model input pixels and are
//! mapped to normalized frame coordinates.

use std::path::Path;

use super::onnx_session::open_session;
use crate::detection::domain::face_detector::{Detection, FaceDetector};
use crate::detection::domain::face_landmarks::{LandmarkSet, MESH_POINT_COUNT};
use crate::detection::domain::face_mesher::FaceMesher;
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 192;

/// Side of the square ROI relative to the longer side of the detection.
const ROI_SCALE: f64 = 1.5;

/// Default face-presence probability below which a mesh is discarded.
pub const DEFAULT_MIN_PRESENCE: f64 = 0.5;

pub struct OnnxFaceMesher {
    session: ort::session::Session,
    roi_detector: Box<dyn FaceDetector>,
    max_faces: usize,
    min_presence: f64,
}

impl OnnxFaceMesher {
    pub fn new(
        model_path: &Path,
        roi_detector: Box<dyn FaceDetector>,
        max_faces: usize,
        min_presence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        Ok(Self {
            session,
            roi_detector,
            max_faces,
            min_presence,
        })
    }

    fn mesh_roi(
        &mut self,
        frame: &Frame,
        roi: &SquareRoi,
    ) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>> {
        let tensor = preprocess(frame, roi);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() < 2 {
            return Err(format!("Face mesh model expected 2 outputs, got {}", outputs.len()).into());
        }

        let landmarks = outputs[0].try_extract_array::<f32>()?;
        let presence = outputs[1].try_extract_array::<f32>()?;
        let coords = landmarks.as_slice().ok_or("Cannot get landmark slice")?;
        let presence = presence
            .as_slice()
            .and_then(|s| s.first().copied())
            .ok_or("Cannot get face presence score")?;

        if (sigmoid(presence) as f64) < self.min_presence {
            return Ok(None);
        }
        if coords.len() < MESH_POINT_COUNT * 3 {
            return Err(format!(
                "Face mesh model returned {} values, expected {}",
                coords.len(),
                MESH_POINT_COUNT * 3
            )
            .into());
        }
        Ok(Some(roi.to_landmarks(coords, frame.width(), frame.height())))
    }
}

impl FaceMesher for OnnxFaceMesher {
    fn mesh(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let mut detections = self.roi_detector.detect(frame)?;
        detections.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        detections.truncate(self.max_faces);

        let mut meshes = Vec::with_capacity(detections.len());
        for det in &detections {
            let roi = SquareRoi::around(det, frame.width(), frame.height());
            if let Some(mesh) = self.mesh_roi(frame, &roi)? {
                meshes.push(mesh);
            }
        }
        Ok(meshes)
    }
}

/// Square region in frame pixels; may extend past the frame edges.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SquareRoi {
    x: f64,
    y: f64,
    size: f64,
}

impl SquareRoi {
    fn around(det: &Detection, frame_width: u32, frame_height: u32) -> Self {
        let b = det.to_pixels(frame_width, frame_height);
        let (cx, cy) = b.center();
        let size = b.width.max(b.height) * ROI_SCALE;
        Self {
            x: cx - size / 2.0,
            y: cy - size / 2.0,
            size,
        }
    }

    /// Maps model-space `(x, y, z)` triples to normalized frame points.
    fn to_landmarks(&self, coords: &[f32], frame_width: u32, frame_height: u32) -> LandmarkSet {
        let scale = self.size / INPUT_SIZE as f64;
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        LandmarkSet::new(
            coords
                .chunks_exact(3)
                .take(MESH_POINT_COUNT)
                .map(|p| {
                    (
                        (self.x + p[0] as f64 * scale) / fw,
                        (self.y + p[1] as f64 * scale) / fh,
                    )
                })
                .collect(),
        )
    }
}

/// Nearest-neighbour resample of `roi` to 192x192, [0,1] NCHW float32.
/// Samples outside the frame stay black.
fn preprocess(frame: &Frame, roi: &SquareRoi) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_w = frame.width() as f64;
    let src_h = frame.height() as f64;
    let step = roi.size / INPUT_SIZE as f64;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        let sy = (roi.y + (y as f64 + 0.5) * step).floor();
        if sy < 0.0 || sy >= src_h {
            continue;
        }
        for x in 0..INPUT_SIZE {
            let sx = (roi.x + (x as f64 + 0.5) * step).floor();
            if sx < 0.0 || sx >= src_w {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[sy as usize, sx as usize, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_roi_is_square_and_centred() {
        let det = Detection::new(0.25, 0.25, 0.25, 0.5, 0.9);
        let roi = SquareRoi::around(&det, 400, 200);
        // Pixel box: x 100..200, y 50..150 → centre (150, 100), side 150
        assert_relative_eq!(roi.size, 150.0);
        assert_relative_eq!(roi.x, 75.0);
        assert_relative_eq!(roi.y, 25.0);
    }

    #[test]
    fn test_to_landmarks_maps_model_space_to_frame() {
        let roi = SquareRoi {
            x: 100.0,
            y: 50.0,
            size: 192.0 * 2.0,
        };
        let mut coords = vec![0.0f32; MESH_POINT_COUNT * 3];
        coords[0] = 96.0; // centre of the model input
        coords[1] = 96.0;
        let lm = roi.to_landmarks(&coords, 1000, 500);
        assert_eq!(lm.len(), MESH_POINT_COUNT);
        let (x, y) = lm.points()[0];
        assert_relative_eq!(x, (100.0 + 192.0) / 1000.0);
        assert_relative_eq!(y, (50.0 + 192.0) / 500.0);
        let (x1, y1) = lm.points()[1];
        assert_relative_eq!(x1, 0.1);
        assert_relative_eq!(y1, 0.1);
    }

    #[test]
    fn test_preprocess_pads_outside_frame_with_black() {
        let frame = Frame::new(vec![255u8; 10 * 10 * 3], 10, 10, 3, 0);
        let roi = SquareRoi {
            x: -10.0,
            y: 0.0,
            size: 20.0,
        };
        let tensor = preprocess(&frame, &roi);
        assert_eq!(tensor.shape(), &[1, 3, INPUT_SIZE, INPUT_SIZE]);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert_relative_eq!(tensor[[0, 0, 0, INPUT_SIZE - 1]], 1.0);
    }
}
