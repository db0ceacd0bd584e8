// Tone and edge filters.
// `Filter` is the closed set of transforms the UI can select; `FilterEngine`
// is the seam the pipeline calls through, so tests can swap in a stub.

use crate::error::Error;
use crate::gamma::GammaLut;
use crate::types::FrameBuffer;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Filter {
    /// Mix toward a brown-toned image; 0.0 = untouched, 1.0 = full sepia.
    SepiaTone { intensity: f32 },
    /// Sobel edge magnitude, scaled by `intensity`.
    EdgeDetect { intensity: f32 },
}

impl Filter {
    /// Short name, used for logs and the HUD.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::SepiaTone { .. } => "SepiaTone",
            Filter::EdgeDetect { .. } => "Edges",
        }
    }

    pub fn intensity(&self) -> f32 {
        match *self {
            Filter::SepiaTone { intensity } | Filter::EdgeDetect { intensity } => intensity,
        }
    }
}

/// Applies a filter to a frame. The output always has the input's extent.
pub trait FilterEngine: Send + Sync {
    fn apply(&self, filter: &Filter, src: &FrameBuffer) -> Result<FrameBuffer, Error>;
}

/// CPU implementation of both filters, in linear light.
pub struct SoftwareFilters {
    lut: GammaLut,
}

impl Default for SoftwareFilters {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareFilters {
    pub fn new() -> Self {
        Self { lut: GammaLut::new() }
    }
}

impl FilterEngine for SoftwareFilters {
    fn apply(&self, filter: &Filter, src: &FrameBuffer) -> Result<FrameBuffer, Error> {
        if src.pixels.len() != src.width * src.height {
            return Err(Error::Filter(format!(
                "{}: buffer holds {} pixels, expected {}x{}",
                filter.name(),
                src.pixels.len(),
                src.width,
                src.height
            )));
        }
        let intensity = filter.intensity();
        if !intensity.is_finite() {
            return Err(Error::Filter(format!("{}: intensity {intensity}", filter.name())));
        }

        Ok(match filter {
            Filter::SepiaTone { .. } => sepia(src, intensity, &self.lut),
            Filter::EdgeDetect { .. } => edges(src, intensity, &self.lut),
        })
    }
}

/// Classic sepia matrix, mixed with the input by `intensity` (clamped to [0,1]).
fn sepia(src: &FrameBuffer, intensity: f32, lut: &GammaLut) -> FrameBuffer {
    let k = intensity.clamp(0.0, 1.0);
    let mut out = FrameBuffer::new(src.width, src.height);

    for (dst, &px) in out.pixels.iter_mut().zip(&src.pixels) {
        let [r, g, b] = lut.pixel_to_linear(px);

        let sr = 0.393 * r + 0.769 * g + 0.189 * b;
        let sg = 0.349 * r + 0.686 * g + 0.168 * b;
        let sb = 0.272 * r + 0.534 * g + 0.131 * b;

        let inv = 1.0 - k;
        *dst = lut.linear_to_pixel([inv * r + k * sr, inv * g + k * sg, inv * b + k * sb]);
    }
    out
}

/// Per-channel Sobel magnitude. Borders clamp to the nearest pixel.
/// A full black-to-white step gives magnitude 1.0 before scaling.
fn edges(src: &FrameBuffer, intensity: f32, lut: &GammaLut) -> FrameBuffer {
    let w = src.width as i32;
    let h = src.height as i32;
    let mut out = FrameBuffer::new(src.width, src.height);
    if w == 0 || h == 0 {
        return out;
    }

    // Linearize once; each pixel is read nine times below.
    let lin: Vec<[f32; 3]> = src.pixels.iter().map(|&px| lut.pixel_to_linear(px)).collect();
    let at = |x: i32, y: i32| -> [f32; 3] {
        let x = x.clamp(0, w - 1) as usize;
        let y = y.clamp(0, h - 1) as usize;
        lin[y * src.width + x]
    };

    for y in 0..h {
        for x in 0..w {
            let (tl, tc, tr) = (at(x - 1, y - 1), at(x, y - 1), at(x + 1, y - 1));
            let (ml, mr) = (at(x - 1, y), at(x + 1, y));
            let (bl, bc, br) = (at(x - 1, y + 1), at(x, y + 1), at(x + 1, y + 1));

            let mut rgb = [0.0f32; 3];
            for c in 0..3 {
                let gx = (tr[c] + 2.0 * mr[c] + br[c]) - (tl[c] + 2.0 * ml[c] + bl[c]);
                let gy = (bl[c] + 2.0 * bc[c] + br[c]) - (tl[c] + 2.0 * tc[c] + tr[c]);
                let mag = (gx * gx + gy * gy).sqrt() / 4.0;
                rgb[c] = mag * intensity;
            }
            out.pixels[(y * w + x) as usize] = lut.linear_to_pixel(rgb);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::unpack_rgb;

    #[test]
    fn names_are_stable() {
        assert_eq!(Filter::SepiaTone { intensity: 1.0 }.name(), "SepiaTone");
        assert_eq!(Filter::EdgeDetect { intensity: 16.0 }.name(), "Edges");
        assert_eq!(Filter::EdgeDetect { intensity: 16.0 }.intensity(), 16.0);
    }

    #[test]
    fn sepia_at_zero_is_identity() {
        let engine = SoftwareFilters::new();
        let src = FrameBuffer {
            width: 3,
            height: 1,
            pixels: vec![0x00_20_80_C0, 0x00_FF_00_00, 0x00_FF_FF_FF],
        };
        let out = engine.apply(&Filter::SepiaTone { intensity: 0.0 }, &src).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn full_sepia_turns_gray_warm() {
        let engine = SoftwareFilters::new();
        let src = FrameBuffer::filled(4, 4, 0x00_80_80_80);
        let out = engine.apply(&Filter::SepiaTone { intensity: 1.0 }, &src).unwrap();
        assert_eq!((out.width, out.height), (4, 4));
        let (r, g, b) = unpack_rgb(out.pixels[0]);
        assert!(r > g && g > b, "expected warm tone, got {r},{g},{b}");
    }

    #[test]
    fn flat_image_has_no_edges() {
        let engine = SoftwareFilters::new();
        let src = FrameBuffer::filled(5, 5, 0x00_55_AA_33);
        let out = engine.apply(&Filter::EdgeDetect { intensity: 16.0 }, &src).unwrap();
        assert!(out.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn vertical_step_lights_up_the_boundary_only() {
        let engine = SoftwareFilters::new();
        // Left half black, right half white.
        let mut src = FrameBuffer::new(8, 4);
        for y in 0..4 {
            for x in 4..8 {
                src.pixels[y * 8 + x] = 0x00_FF_FF_FF;
            }
        }
        let out = engine.apply(&Filter::EdgeDetect { intensity: 1.0 }, &src).unwrap();
        for y in 0..4 {
            assert_eq!(out.get(0, y), 0);
            assert_eq!(out.get(7, y), 0);
            assert_ne!(out.get(3, y), 0);
            assert_ne!(out.get(4, y), 0);
        }
    }

    #[test]
    fn mismatched_buffer_is_an_error() {
        let engine = SoftwareFilters::new();
        let bad = FrameBuffer { width: 4, height: 4, pixels: vec![0; 3] };
        assert!(matches!(
            engine.apply(&Filter::SepiaTone { intensity: 1.0 }, &bad),
            Err(Error::Filter(_))
        ));
    }
}
