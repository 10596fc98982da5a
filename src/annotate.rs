use image::{Rgb, RgbImage};

use crate::barcode_decoders::{Detection, Rect};

pub(crate) const HIGHLIGHT: Rgb<u8> = Rgb([0, 255, 0]);
const THICKNESS: u32 = 2;

/// Outline every detection on the colour frame.
///
/// Text is drawn by the display as an overlay, positioned from the same
/// rectangles.
pub(crate) fn annotate(frame: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        draw_rect(frame, detection.rect, HIGHLIGHT);
    }
}

fn draw_rect(frame: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let left = rect.x.min(width - 1);
    let top = rect.y.min(height - 1);
    let right = rect.x.saturating_add(rect.width).min(width - 1);
    let bottom = rect.y.saturating_add(rect.height).min(height - 1);

    for offset in 0..THICKNESS {
        for x in left..=right {
            put(frame, x, top.saturating_add(offset), color);
            put(frame, x, bottom.saturating_sub(offset), color);
        }

        for y in top..=bottom {
            put(frame, left.saturating_add(offset), y, color);
            put(frame, right.saturating_sub(offset), y, color);
        }
    }
}

fn put(frame: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if let Some(pixel) = frame.get_pixel_mut_checked(x, y) {
        *pixel = color;
    }
}
