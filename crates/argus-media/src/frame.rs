//! Captured frame.

use chrono::{DateTime, Utc};
use image::RgbImage;
use std::sync::Arc;

/// A dense RGB8 frame of source-native dimensions.
///
/// Pixels live behind an `Arc` so a detector can hold a read-only view while
/// inference runs; `image_mut` copies only if such a view is still alive.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap an image captured now.
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, Utc::now())
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Utc>) -> Self {
        Self {
            image: Arc::new(image),
            captured_at,
        }
    }

    /// Build a frame from raw RGB24 bytes.
    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        Arc::make_mut(&mut self.image)
    }

    /// Shared read-only view of the pixels.
    pub fn shared_image(&self) -> Arc<RgbImage> {
        Arc::clone(&self.image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_from_rgb24_checks_length() {
        assert!(Frame::from_rgb24(2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_rgb24(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_image_mut_does_not_touch_shared_view() {
        let mut frame = Frame::new(RgbImage::new(4, 4));
        let view = frame.shared_image();
        frame.image_mut().put_pixel(0, 0, Rgb([255, 0, 0]));

        assert_eq!(view.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(frame.image().get_pixel(0, 0), &Rgb([255, 0, 0]));
    }
}
