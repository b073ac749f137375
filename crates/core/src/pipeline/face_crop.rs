use thiserror::Error;

use crate::shared::bounding_box::{BoundingBox, PixelRect};
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("padded crop {rect:?} of box {bbox:?} is empty in a {frame_width}x{frame_height} frame")]
pub struct EmptyCropError {
    pub bbox: BoundingBox,
    pub rect: PixelRect,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Cuts `bbox` grown by `padding` pixels per side, clamped to the frame.
pub fn padded_crop(frame: &Frame, bbox: &BoundingBox, padding: u32) -> Result<Frame, EmptyCropError> {
    let rect = bbox.padded_rect(padding, frame.width(), frame.height());
    if rect.is_empty() {
        return Err(EmptyCropError {
            bbox: *bbox,
            rect,
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }
    Ok(frame.crop(rect))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(vec![0u8; 100 * 80 * 3], 100, 80, 3, 4)
    }

    #[test]
    fn test_crop_is_padded() {
        let crop = padded_crop(&frame(), &BoundingBox::new(30.0, 30.0, 20.0, 10.0), 5).unwrap();
        assert_eq!((crop.width(), crop.height()), (30, 20));
        assert_eq!(crop.index(), 4);
    }

    #[test]
    fn test_crop_is_clamped_at_edges() {
        let crop = padded_crop(&frame(), &BoundingBox::new(90.0, 70.0, 30.0, 30.0), 20).unwrap();
        assert_eq!((crop.width(), crop.height()), (30, 30));
    }

    #[test]
    fn test_box_outside_frame_is_empty_crop() {
        let err = padded_crop(&frame(), &BoundingBox::new(200.0, 10.0, 20.0, 20.0), 20).unwrap_err();
        assert!(err.rect.is_empty());
        assert_eq!(err.frame_width, 100);
    }
}
