//! Template-matching check for corrupted frames.
//!
//! Some cameras emit smeared or half-gray frames when the stream hiccups. A
//! fixed region of a good frame (an on-screen clock, a logo) is compared to a
//! grayscale template with a sum-of-squared-differences score; a score above
//! the configured threshold marks the frame as bad.

use argus_models::BadFrameCheckerConfig;
use image::{imageops, GrayImage, RgbImage};
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use tracing::warn;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// A channel value above this in the reverse pixel means the region is drawn
/// light-on-dark and must be inverted before matching.
const REVERSE_PIXEL_LEVEL: u8 = 50;

/// Region of interest in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Debug)]
pub struct BadFrameChecker {
    region: Region,
    template: GrayImage,
    threshold: f64,
    reverse_pixel: Option<(u32, u32)>,
}

impl BadFrameChecker {
    /// Load the template from disk and build a checker.
    pub fn from_config(config: &BadFrameCheckerConfig) -> MediaResult<Self> {
        if !config.template_path.exists() {
            return Err(MediaError::FileNotFound(config.template_path.clone()));
        }
        let template = image::open(&config.template_path)?.to_luma8();
        Self::new(config, template)
    }

    /// Build a checker with an already-loaded template.
    pub fn new(config: &BadFrameCheckerConfig, template: GrayImage) -> MediaResult<Self> {
        let [y0, y1, x0, x1] = config.coords;
        if y1 <= y0 || x1 <= x0 {
            return Err(MediaError::InvalidFrame(format!(
                "bad frame region {:?} is empty",
                config.coords
            )));
        }
        let region = Region {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        };

        if template.dimensions() != (region.width, region.height) {
            return Err(MediaError::InvalidFrame(format!(
                "template is {}x{}, region is {}x{}",
                template.width(),
                template.height(),
                region.width,
                region.height
            )));
        }

        let reverse_pixel = config.reverse_pixel.map(|[y, x]| (x, y));
        if let Some((x, y)) = reverse_pixel {
            if x >= region.width || y >= region.height {
                return Err(MediaError::InvalidFrame(format!(
                    "reverse pixel [{}, {}] is outside the region",
                    y, x
                )));
            }
        }

        Ok(Self {
            region,
            template,
            threshold: config.threshold,
            reverse_pixel,
        })
    }

    /// Sum of squared differences between the frame region and the template.
    ///
    /// `None` if the region does not fit in the frame.
    pub fn score(&self, image: &RgbImage) -> Option<f64> {
        let Region {
            x,
            y,
            width,
            height,
        } = self.region;
        if x + width > image.width() || y + height > image.height() {
            return None;
        }

        let mut region = imageops::crop_imm(image, x, y, width, height).to_image();
        if let Some((px, py)) = self.reverse_pixel {
            if region
                .get_pixel(px, py)
                .0
                .iter()
                .all(|&c| c > REVERSE_PIXEL_LEVEL)
            {
                imageops::invert(&mut region);
            }
        }

        let gray = imageops::grayscale(&region);
        let result = match_template(&gray, &self.template, MatchTemplateMethod::SumOfSquaredErrors);
        Some(f64::from(result.get_pixel(0, 0).0[0]))
    }

    /// Whether the frame is bad and should be dropped.
    pub fn check(&self, frame: &Frame) -> bool {
        match self.score(frame.image()) {
            Some(diff) => diff > self.threshold,
            None => {
                warn!(
                    width = frame.width(),
                    height = frame.height(),
                    "Bad frame region does not fit in frame, skipping check"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use std::path::PathBuf;

    fn config(threshold: f64, reverse_pixel: Option<[u32; 2]>) -> BadFrameCheckerConfig {
        BadFrameCheckerConfig {
            coords: [2, 6, 4, 8],
            template_path: PathBuf::from("unused.png"),
            threshold,
            reverse_pixel,
        }
    }

    fn frame_with_region(value: u8) -> Frame {
        let mut image = RgbImage::new(16, 16);
        for y in 2..6 {
            for x in 4..8 {
                image.put_pixel(x, y, Rgb([value, value, value]));
            }
        }
        Frame::new(image)
    }

    #[test]
    fn test_matching_region_is_good() {
        let template = GrayImage::from_pixel(4, 4, Luma([0]));
        let checker = BadFrameChecker::new(&config(10.0, None), template).unwrap();
        assert!(!checker.check(&frame_with_region(0)));
    }

    #[test]
    fn test_mismatching_region_is_bad() {
        let template = GrayImage::from_pixel(4, 4, Luma([0]));
        let checker = BadFrameChecker::new(&config(10.0, None), template).unwrap();
        assert!(checker.check(&frame_with_region(200)));
    }

    #[test]
    fn test_reverse_pixel_inverts_region() {
        let template = GrayImage::from_pixel(4, 4, Luma([0]));
        let checker = BadFrameChecker::new(&config(10.0, Some([0, 0])), template).unwrap();
        // A white region inverts to black and matches the template.
        assert!(!checker.check(&frame_with_region(255)));
    }

    #[test]
    fn test_template_size_must_match_region() {
        let template = GrayImage::new(3, 4);
        assert!(BadFrameChecker::new(&config(10.0, None), template).is_err());
    }

    #[test]
    fn test_region_outside_frame_is_not_bad() {
        let template = GrayImage::from_pixel(4, 4, Luma([0]));
        let checker = BadFrameChecker::new(&config(10.0, None), template).unwrap();
        assert!(!checker.check(&Frame::new(RgbImage::new(5, 5))));
    }
}
