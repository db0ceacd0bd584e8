// Crop math: cut a full-width window out of the frame whose height/width
// matches the display panel, centered vertically.

use crate::error::Error;
use crate::types::FrameBuffer;

/// Target height-to-width ratio of the display panel.
/// Computed once when the window is created; never changes afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AspectRatio(f64);

impl AspectRatio {
    /// `None` unless the ratio is finite and > 0.
    pub fn new(ratio: f64) -> Option<Self> {
        (ratio.is_finite() && ratio > 0.0).then_some(Self(ratio))
    }

    /// Ratio of a display surface, `height / width`.
    pub fn of_surface(width: usize, height: usize) -> Option<Self> {
        if width == 0 {
            return None;
        }
        Self::new(height as f64 / width as f64)
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Crop window for a `width` x `height` source:
/// height = floor(width * ratio), y = (height_src - crop_height) / 2 (truncating),
/// x = 0, full width. Fails when the window does not fit inside the source.
pub fn crop_rect(width: usize, height: usize, ratio: AspectRatio) -> Result<CropRect, Error> {
    let crop_h = (width as f64 * ratio.get()).floor() as i64;
    // i64 division truncates toward zero, same as the integer math we mirror.
    let y = (height as i64 - crop_h) / 2;

    let fits = crop_h > 0 && width > 0 && y >= 0 && y + crop_h <= height as i64;
    if !fits {
        return Err(Error::CropOutOfBounds {
            y,
            width: width as i64,
            height: crop_h,
            src_width: width,
            src_height: height,
        });
    }

    Ok(CropRect { x: 0, y: y as usize, width, height: crop_h as usize })
}

/// Copy the rows inside `rect` into a new buffer.
pub fn crop(src: &FrameBuffer, rect: CropRect) -> Result<FrameBuffer, Error> {
    if rect.x + rect.width > src.width || rect.y + rect.height > src.height {
        return Err(Error::CropOutOfBounds {
            y: rect.y as i64,
            width: rect.width as i64,
            height: rect.height as i64,
            src_width: src.width,
            src_height: src.height,
        });
    }

    let mut pixels = Vec::with_capacity(rect.width * rect.height);
    for row in rect.y..rect.y + rect.height {
        let start = row * src.width + rect.x;
        pixels.extend_from_slice(&src.pixels[start..start + rect.width]);
    }
    Ok(FrameBuffer { width: rect.width, height: rect.height, pixels })
}

/// Compute the window for `src` and cut it out.
pub fn crop_to_aspect(src: &FrameBuffer, ratio: AspectRatio) -> Result<FrameBuffer, Error> {
    let rect = crop_rect(src.width, src.height, ratio)?;
    crop(src, rect)
}
