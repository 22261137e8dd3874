//! Frame annotation.

use argus_models::Detection;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Outline color for detected objects.
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Draw a detection's box onto the image.
///
/// The box is clamped to the image; boxes that collapse after clamping are
/// skipped. Returns whether anything was drawn.
pub fn draw_detection(image: &mut RgbImage, detection: &Detection) -> bool {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return false;
    }

    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let x0 = detection.xmin.clamp(0, max_x);
    let y0 = detection.ymin.clamp(0, max_y);
    let x1 = detection.xmax.clamp(0, max_x);
    let y1 = detection.ymax.clamp(0, max_y);

    if x1 <= x0 || y1 <= y0 {
        return false;
    }

    let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
    draw_hollow_rect_mut(image, rect, BOX_COLOR);
    true
}
