pub mod command_face_recognizer;
pub mod embedding_face_recognizer;
