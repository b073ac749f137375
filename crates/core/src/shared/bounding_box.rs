use serde::Serialize;

/// Axis-aligned face box in absolute pixel coordinates of the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Integer pixel rectangle, already clamped to frame bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scales a relative `(xmin, ymin, width, height)` box to pixels.
    pub fn from_relative(
        xmin: f64,
        ymin: f64,
        width: f64,
        height: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        Self::new(xmin * fw, ymin * fh, width * fw, height * fh)
    }

    /// Tight box around a cloud of pixel-space points.
    ///
    /// Returns `None` for an empty point set.
    pub fn enclosing(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for (x, y) in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Grows the box by `padding` pixels on every side and clamps it to the
    /// frame. The result may be empty when the box lies outside the frame.
    pub fn padded_rect(&self, padding: u32, frame_width: u32, frame_height: u32) -> PixelRect {
        let pad = padding as f64;
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let x1 = (self.x.floor() - pad).clamp(0.0, fw);
        let y1 = (self.y.floor() - pad).clamp(0.0, fh);
        let x2 = ((self.x + self.width).floor() + pad).clamp(0.0, fw);
        let y2 = ((self.y + self.height).floor() + pad).clamp(0.0, fh);

        PixelRect {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1).max(0.0) as u32,
            height: (y2 - y1).max(0.0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_from_relative_scales_to_pixels() {
        let b = BoundingBox::from_relative(0.25, 0.5, 0.1, 0.2, 640, 480);
        assert_relative_eq!(b.x, 160.0);
        assert_relative_eq!(b.y, 240.0);
        assert_relative_eq!(b.width, 64.0);
        assert_relative_eq!(b.height, 96.0);
    }

    #[test]
    fn test_enclosing_points() {
        let b = BoundingBox::enclosing([(10.0, 40.0), (30.0, 20.0), (20.0, 30.0)]).unwrap();
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 20.0, 20.0));
    }

    #[test]
    fn test_enclosing_empty_is_none() {
        assert!(BoundingBox::enclosing(std::iter::empty()).is_none());
    }

    // ── Padding ──────────────────────────────────────────────────────

    #[test]
    fn test_padded_rect_inside_frame() {
        let b = BoundingBox::new(100.0, 100.0, 50.0, 60.0);
        let r = b.padded_rect(20, 640, 480);
        assert_eq!(
            r,
            PixelRect {
                x: 80,
                y: 80,
                width: 90,
                height: 100
            }
        );
    }

    #[rstest]
    #[case::top_left(BoundingBox::new(5.0, 5.0, 30.0, 30.0), PixelRect { x: 0, y: 0, width: 55, height: 55 })]
    #[case::bottom_right(BoundingBox::new(90.0, 90.0, 30.0, 30.0), PixelRect { x: 70, y: 70, width: 30, height: 30 })]
    fn test_padded_rect_clamps_to_frame(#[case] b: BoundingBox, #[case] expected: PixelRect) {
        assert_eq!(b.padded_rect(20, 100, 100), expected);
    }

    #[test]
    fn test_padded_rect_outside_frame_is_empty() {
        let b = BoundingBox::new(300.0, 300.0, 40.0, 40.0);
        assert!(b.padded_rect(20, 100, 100).is_empty());
    }
}
