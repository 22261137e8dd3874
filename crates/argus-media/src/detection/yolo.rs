//! YOLOv8 pre- and post-processing.
//!
//! Frames are padded to a square (bottom/right, black) before being resized
//! to the model input, so one scale factor maps model coordinates back to
//! frame pixels.

use argus_models::Detection;
use image::{imageops, RgbImage};

use crate::detection::coco_label;

/// Scale from model input coordinates to frame pixels.
pub fn input_scale(frame_width: u32, frame_height: u32, input_size: u32) -> f32 {
    frame_width.max(frame_height) as f32 / input_size as f32
}

/// Pad to square, resize to `input_size` and lay out as normalized NCHW.
pub fn preprocess(image: &RgbImage, input_size: u32) -> Vec<f32> {
    let side = image.width().max(image.height());
    let mut square = RgbImage::new(side, side);
    imageops::replace(&mut square, image, 0, 0);
    let resized = imageops::resize(&square, input_size, input_size, imageops::FilterType::Triangle);

    let plane = (input_size * input_size) as usize;
    let mut chw = vec![0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            chw[c * plane + i] = pixel[c] as f32 / 255.0;
        }
    }
    chw
}

/// Decode a `[1, 4 + classes, boxes]` output tensor into frame-space boxes.
///
/// Candidates below `confidence_threshold` are skipped; no suppression is
/// applied here.
pub fn decode(
    output: &[f32],
    num_classes: usize,
    scale: f32,
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let features = 4 + num_classes;
    if output.is_empty() || output.len() % features != 0 {
        return Vec::new();
    }
    let num_boxes = output.len() / features;
    let at = |feature: usize, i: usize| output[feature * num_boxes + i];

    let max_x = frame_width.saturating_sub(1) as f32;
    let max_y = frame_height.saturating_sub(1) as f32;

    let mut detections = Vec::new();
    for i in 0..num_boxes {
        let (best_class, best_score) = (0..num_classes)
            .map(|c| (c, at(4 + c, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if best_score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let xmin = ((cx - w / 2.0) * scale).clamp(0.0, max_x);
        let ymin = ((cy - h / 2.0) * scale).clamp(0.0, max_y);
        let xmax = ((cx + w / 2.0) * scale).clamp(0.0, max_x);
        let ymax = ((cy + h / 2.0) * scale).clamp(0.0, max_y);

        detections.push(Detection::new(
            best_class,
            coco_label(best_class),
            best_score,
            (xmin as i32, ymin as i32, xmax as i32, ymax as i32),
        ));
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an output tensor with the given boxes, `(cx, cy, w, h, class, score)`.
    fn tensor(num_classes: usize, boxes: &[(f32, f32, f32, f32, usize, f32)]) -> Vec<f32> {
        let n = boxes.len();
        let mut out = vec![0f32; (4 + num_classes) * n];
        for (i, &(cx, cy, w, h, class, score)) in boxes.iter().enumerate() {
            out[i] = cx;
            out[n + i] = cy;
            out[2 * n + i] = w;
            out[3 * n + i] = h;
            out[(4 + class) * n + i] = score;
        }
        out
    }

    #[test]
    fn test_scale_uses_longest_side() {
        assert!((input_scale(1280, 720, 640) - 2.0).abs() < f32::EPSILON);
        assert!((input_scale(480, 640, 640) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_maps_to_frame_pixels() {
        let out = tensor(3, &[(100.0, 50.0, 40.0, 20.0, 2, 0.9)]);
        let dets = decode(&out, 3, 2.0, 1280, 720, 0.35);

        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!(d.class_id, 2);
        assert_eq!(d.label, "car");
        assert_eq!((d.xmin, d.ymin, d.xmax, d.ymax), (160, 80, 240, 120));
    }

    #[test]
    fn test_decode_applies_threshold_and_clamps() {
        let out = tensor(
            2,
            &[(10.0, 10.0, 40.0, 40.0, 0, 0.8), (300.0, 300.0, 10.0, 10.0, 1, 0.2)],
        );
        let dets = decode(&out, 2, 1.0, 100, 100, 0.35);

        assert_eq!(dets.len(), 1);
        assert_eq!((dets[0].xmin, dets[0].ymin), (0, 0));
        assert_eq!(dets[0].label, "person");
    }

    #[test]
    fn test_decode_rejects_malformed_output() {
        assert!(decode(&[1.0, 2.0, 3.0], 80, 1.0, 10, 10, 0.1).is_empty());
    }

    #[test]
    fn test_preprocess_pads_bottom_right() {
        let image = RgbImage::from_pixel(4, 2, image::Rgb([255, 255, 255]));
        let chw = preprocess(&image, 4);
        assert_eq!(chw.len(), 3 * 16);
        // Top-left keeps the image, bottom row is padding.
        assert!(chw[0] > 0.9);
        assert!(chw[15] < 0.1);
    }
}
