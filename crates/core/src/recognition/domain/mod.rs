pub mod face_recognizer;
pub mod gallery;
