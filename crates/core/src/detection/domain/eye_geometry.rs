//! Eye Aspect Ratio (EAR) from six eye-contour landmarks.
//!
//! ```text
//!        p2   p3
//!   p1 +----------+ p4      EAR = (|p2 - p6| + |p3 - p5|) / (2 |p1 - p4|)
//!        p6   p5
//! ```
//!
//! An open eye sits around 0.3; the ratio collapses toward 0 as the lids
//! close. The ratio is a quotient of distances, so it does not depend on
//! face size or image resolution.

use thiserror::Error;

use super::face_landmarks::LandmarkSet;
use crate::shared::math::distance;

/// Six landmark indices ordered: outer corner, upper lid 1, upper lid 2,
/// inner corner, lower lid 2, lower lid 1.
pub type EyeIndices = [usize; 6];

/// Left eye contour in the 468-point mesh numbering.
pub const LEFT_EYE: EyeIndices = [362, 385, 387, 263, 373, 380];

/// Right eye contour in the 468-point mesh numbering.
pub const RIGHT_EYE: EyeIndices = [33, 160, 158, 133, 153, 144];

/// Corner spans at or below this are treated as a collapsed eye.
const MIN_CORNER_SPAN: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DegenerateGeometryError {
    #[error("eye corners coincide (span {span:e}), aspect ratio undefined")]
    CollapsedEye { span: f64 },
    #[error("landmark {index} missing from a set of {available} points")]
    MissingLandmark { index: usize, available: usize },
}

/// Computes the EAR of one eye.
pub fn eye_aspect_ratio(
    landmarks: &LandmarkSet,
    eye: &EyeIndices,
) -> Result<f64, DegenerateGeometryError> {
    let mut p = [(0.0, 0.0); 6];
    for (slot, &index) in p.iter_mut().zip(eye.iter()) {
        *slot = landmarks
            .point(index)
            .ok_or(DegenerateGeometryError::MissingLandmark {
                index,
                available: landmarks.len(),
            })?;
    }

    let span = distance(p[0], p[3]);
    if span <= MIN_CORNER_SPAN || !span.is_finite() {
        return Err(DegenerateGeometryError::CollapsedEye { span });
    }

    Ok((distance(p[1], p[5]) + distance(p[2], p[4])) / (2.0 * span))
}

/// Mean EAR of both eyes; undefined when either eye is.
pub fn face_eye_aspect_ratio(landmarks: &LandmarkSet) -> Result<f64, DegenerateGeometryError> {
    let left = eye_aspect_ratio(landmarks, &LEFT_EYE)?;
    let right = eye_aspect_ratio(landmarks, &RIGHT_EYE)?;
    Ok((left + right) / 2.0)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::detection::domain::face_landmarks::MESH_POINT_COUNT;

    /// Writes a synthetic eye with corner span `width` and lid gap
    /// `width * ear` centred on `(cx, cy)`, so its EAR is exactly `ear`.
    fn place_eye(points: &mut [(f64, f64)], eye: &EyeIndices, cx: f64, cy: f64, ear: f64) {
        let width = 0.04;
        let half_gap = width * ear / 2.0;
        points[eye[0]] = (cx - width / 2.0, cy);
        points[eye[1]] = (cx - width / 6.0, cy - half_gap);
        points[eye[2]] = (cx + width / 6.0, cy - half_gap);
        points[eye[3]] = (cx + width / 2.0, cy);
        points[eye[4]] = (cx + width / 6.0, cy + half_gap);
        points[eye[5]] = (cx - width / 6.0, cy + half_gap);
    }

    /// Full mesh for a face whose landmark box spans
    /// `(left, top)`..`(left + size, top + size)` in normalized coordinates
    /// and whose eyes both have aspect ratio `ear`.
    pub fn face_with_ear(left: f64, top: f64, size: f64, ear: f64) -> LandmarkSet {
        let mut points = vec![(left + size / 2.0, top + size / 2.0); MESH_POINT_COUNT];
        // Face outline extremes.
        points[10] = (left + size / 2.0, top);
        points[152] = (left + size / 2.0, top + size);
        points[234] = (left, top + size / 2.0);
        points[454] = (left + size, top + size / 2.0);
        let eye_y = top + size * 0.4;
        place_eye(&mut points, &RIGHT_EYE, left + size * 0.3, eye_y, ear);
        place_eye(&mut points, &LEFT_EYE, left + size * 0.7, eye_y, ear);
        LandmarkSet::new(points)
    }
}
