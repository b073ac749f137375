/// Directory name used under the platform config/cache roots.
pub const APP_DIR_NAME: &str = "BlinkGate";

pub const DETECTOR_MODEL_NAME: &str = "face_detection_short_range.onnx";
pub const MESH_MODEL_NAME: &str = "face_landmark.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Gallery directory used when none is given on the command line.
pub const DEFAULT_GALLERY_DIR: &str = "faces";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Placeholder label for faces without a gallery match.
pub const UNKNOWN_IDENTITY: &str = "Unknown";
