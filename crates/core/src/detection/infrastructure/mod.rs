pub mod onnx_blazeface_detector;
pub mod onnx_face_mesher;
pub mod onnx_session;
