// Eye markers: a red ring around every detected eye.
// Detector coordinates have their origin at the bottom-left; the frame buffer
// starts at the top-left, so y is flipped before drawing.

use crate::draw::put_pixel;
use crate::types::{FaceFeature, FrameBuffer};

pub const MARKER_RADIUS: f32 = 25.0;
pub const MARKER_COLOR: u32 = 0x00_FF_00_00;
/// Ring thickness in pixels, growing inward from the radius.
const MARKER_STROKE: i32 = 2;

/// Bounding square of one ring, in top-left-origin frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeMarker {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl EyeMarker {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.radius, self.y + self.radius)
    }
}

/// One marker per eye present, in detection order (left eye before right).
pub fn eye_markers(faces: &[FaceFeature], frame_height: usize) -> Vec<EyeMarker> {
    let h = frame_height as f32;
    faces
        .iter()
        .flat_map(|face| face.eyes())
        .map(|eye| EyeMarker {
            x: eye.x - MARKER_RADIUS,
            y: h - eye.y - MARKER_RADIUS,
            radius: MARKER_RADIUS,
        })
        .collect()
}

/// Copy of `src` with every marker stroked on top.
pub fn annotate(src: &FrameBuffer, markers: &[EyeMarker]) -> FrameBuffer {
    let mut out = src.clone();
    for m in markers {
        let (cx, cy) = m.center();
        let r = m.radius.round() as i32;
        for k in 0..MARKER_STROKE {
            stroke_circle(&mut out, cx.round() as i32, cy.round() as i32, r - k, MARKER_COLOR);
        }
    }
    out
}

/// Midpoint circle outline; pixels outside the frame are skipped.
fn stroke_circle(fb: &mut FrameBuffer, cx: i32, cy: i32, radius: i32, color: u32) {
    if radius <= 0 {
        return;
    }
    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;
    while x >= y {
        for (dx, dy) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
            put_pixel(fb, cx + dx, cy + dy, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}
