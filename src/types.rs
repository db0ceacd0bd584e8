// Core types shared by the capture thread, the pipeline and the window.

use image::{Rgb, RgbImage};
use std::time::Instant;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is (pixels)
    pub height: usize,     // how tall the frame is (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    /// All-black buffer of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// Same size, every pixel set to `color`.
    #[cfg(test)]
    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Self { width, height, pixels: vec![color; width * height] }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    /// Pack an RGB8 image into 0x00RRGGBB pixels.
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        Self::from_rgb_bytes(w as usize, h as usize, img.as_raw())
    }

    /// Pack tightly-packed RGB8 bytes (row-major, 3 bytes per pixel).
    /// Missing trailing bytes leave the remaining pixels black.
    pub fn from_rgb_bytes(width: usize, height: usize, rgb: &[u8]) -> Self {
        let mut out = Self::new(width, height);
        for (dst, px) in out.pixels.iter_mut().zip(rgb.chunks_exact(3)) {
            *dst = pack_rgb(px[0], px[1], px[2]);
        }
        out
    }

    /// Unpack into an RGB8 image (used for PNG snapshots).
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let (r, g, b) = unpack_rgb(self.get(x as usize, y as usize));
            Rgb([r, g, b])
        })
    }
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
pub fn unpack_rgb(px: u32) -> (u8, u8, u8) {
    (((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8)
}

/// How the sensor was held when the buffer was captured.
/// The pipeline rotates every frame back to `Portrait` before looking at it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SensorOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    /// Device rotated counter-clockwise; content must turn clockwise.
    LandscapeLeft,
    /// Device rotated clockwise; content must turn counter-clockwise.
    LandscapeRight,
}

/// Tag handed to the display sink together with a finished image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayOrientation {
    Up,
    /// Flipped horizontally, no rotation (front camera selfie view).
    UpMirrored,
}

/// One captured sample, as delivered by the capture thread.
#[derive(Clone, Debug)]
pub struct Frame {
    pub buffer: FrameBuffer,
    pub sequence: u64,
    pub captured_at: Instant,
    pub orientation: SensorOrientation,
}

/// 2D point in detector space (origin bottom-left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One detected face; either eye may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceFeature {
    pub left_eye: Option<Point>,
    pub right_eye: Option<Point>,
}

impl FaceFeature {
    pub fn eyes(&self) -> impl Iterator<Item = Point> {
        self.left_eye.into_iter().chain(self.right_eye)
    }
}
