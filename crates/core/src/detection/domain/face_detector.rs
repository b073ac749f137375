use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One detector hit: a box relative to the frame (all fields in [0, 1])
/// and the model's confidence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub xmin: f64,
    pub ymin: f64,
    pub width: f64,
    pub height: f64,
    pub score: f64,
}

impl Detection {
    pub fn new(xmin: f64, ymin: f64, width: f64, height: f64, score: f64) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            score,
        }
    }

    /// The box in absolute pixels of a `frame_width` x `frame_height` frame.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        BoundingBox::from_relative(
            self.xmin,
            self.ymin,
            self.width,
            self.height,
            frame_width,
            frame_height,
        )
    }
}

/// Domain interface for face detection.
///
/// Implementations may keep scratch buffers between frames, hence
/// `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
