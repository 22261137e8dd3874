//! Detector output.

use serde::{Deserialize, Serialize};

/// A labeled, confidence-scored, axis-aligned box in the pixel space of the
/// original (not resized) frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class index in the detector's label map
    #[serde(default)]
    pub class_id: usize,
    /// Human-readable label (e.g. "person")
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl Detection {
    pub fn new(
        class_id: usize,
        label: impl Into<String>,
        confidence: f32,
        (xmin, ymin, xmax, ymax): (i32, i32, i32, i32),
    ) -> Self {
        Self {
            class_id,
            label: label.into(),
            confidence,
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Box width; zero for an inverted box.
    pub fn width(&self) -> u32 {
        extent(self.xmin, self.xmax)
    }

    pub fn height(&self) -> u32 {
        extent(self.ymin, self.ymax)
    }

    /// Box area in square pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = self.xmax.min(other.xmax);
        let y2 = self.ymax.min(other.ymax);

        let intersection = (u64::from(extent(x1, x2)) * u64::from(extent(y1, y2))) as f32;
        let union = self.area() as f32 + other.area() as f32 - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// `hi - lo` clamped at zero. Coordinates come from external detectors, so
/// the difference is taken in `i64` where it cannot overflow.
fn extent(lo: i32, hi: i32) -> u32 {
    let span = (i64::from(hi) - i64::from(lo)).max(0);
    u32::try_from(span).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area() {
        let d = Detection::new(0, "person", 0.9, (10, 20, 110, 70));
        assert_eq!(d.width(), 100);
        assert_eq!(d.height(), 50);
        assert_eq!(d.area(), 5000);
    }

    #[test]
    fn test_inverted_box_has_zero_area() {
        let d = Detection::new(0, "person", 0.9, (100, 100, 10, 10));
        assert_eq!(d.area(), 0);
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let d = Detection::new(0, "person", 0.9, (-1, i32::MIN, i32::MAX, i32::MAX));
        assert_eq!(d.width(), u32::MAX);
        assert_eq!(d.height(), u32::MAX);
        assert_eq!(d.area(), u64::from(u32::MAX) * u64::from(u32::MAX));

        let other = Detection::new(0, "car", 0.5, (i32::MIN, 0, i32::MAX, 10));
        let iou = d.iou(&other);
        assert!((0.0..=1.0).contains(&iou));
    }

    #[test]
    fn test_iou() {
        let a = Detection::new(0, "person", 0.9, (0, 0, 10, 10));
        let b = Detection::new(0, "person", 0.8, (5, 0, 15, 10));
        // intersection 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);

        let far = Detection::new(0, "person", 0.8, (50, 50, 60, 60));
        assert_eq!(a.iou(&far), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_deserialize_without_class_id() {
        let d: Detection = serde_json::from_str(
            r#"{"label":"car","confidence":0.5,"xmin":1,"ymin":2,"xmax":3,"ymax":4}"#,
        )
        .unwrap();
        assert_eq!(d.class_id, 0);
        assert_eq!(d.label, "car");
    }
}
