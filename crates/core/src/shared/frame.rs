use ndarray::{s, ArrayView3};

use super::bounding_box::PixelRect;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at capture boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps a decoded RGB image as frame `index`.
    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `rect` into a new frame with the same index.
    ///
    /// `rect` must already be clamped to the frame; an empty rect yields an
    /// empty frame.
    pub fn crop(&self, rect: PixelRect) -> Frame {
        let x1 = (rect.x.min(self.width)) as usize;
        let y1 = (rect.y.min(self.height)) as usize;
        let x2 = (rect.x + rect.width).min(self.width) as usize;
        let y2 = (rect.y + rect.height).min(self.height) as usize;

        let region = self.as_ndarray();
        let view = region.slice(s![y1..y2, x1..x2, ..]);
        let data: Vec<u8> = view.iter().copied().collect();

        Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.index,
        )
    }

    /// Horizontally flipped copy (selfie view).
    pub fn mirrored(&self) -> Frame {
        let row_len = self.width as usize * self.channels as usize;
        let ch = self.channels as usize;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len.max(1)) {
            for px in row.chunks_exact(ch.max(1)).rev() {
                data.extend_from_slice(px);
            }
        }
        Frame::new(data, self.width, self.height, self.channels, self.index)
    }

    /// Converts a 3-channel frame into an `image::RgbImage`.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
