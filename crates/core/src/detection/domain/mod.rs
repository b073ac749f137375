pub mod eye_geometry;
pub mod face_detector;
pub mod face_landmarks;
pub mod face_mesher;
