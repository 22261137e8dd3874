//! Class-agnostic non-maximum suppression.

use argus_models::Detection;
use std::cmp::Ordering;

/// Keep the most confident box of every overlapping group.
///
/// Boxes are visited in descending confidence; a box overlapping an already
/// kept box with IoU above `iou_threshold` is dropped regardless of class.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if keep.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}
