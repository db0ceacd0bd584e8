// Window + software drawing utilities.
// 1) A window with two panels: raw preview on the left, filtered on the right.
// 2) Key bindings for the three toggles plus snapshot/retry/quit.
// 3) A tiny 5x7 bitmap font for the status line under the panels.

use crate::error::Error;
use crate::types::{DisplayOrientation, FrameBuffer};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// Space between panels and around the window edge.
pub const GAP: usize = 8;
/// Height of the status line below the panels.
pub const HUD_HEIGHT: usize = 16;

const BACKGROUND: u32 = 0x00_00_00_00;
const EMPTY_PANEL: u32 = 0x00_20_20_20;

/// Where the two panels sit inside the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub panel_width: usize,
    pub panel_height: usize,
}

impl Layout {
    pub fn window_size(&self) -> (usize, usize) {
        (2 * self.panel_width + 3 * GAP, self.panel_height + 2 * GAP + HUD_HEIGHT)
    }

    pub fn preview_origin(&self) -> (usize, usize) {
        (GAP, GAP)
    }

    pub fn filtered_origin(&self) -> (usize, usize) {
        (2 * GAP + self.panel_width, GAP)
    }

    pub fn hud_origin(&self) -> (i32, i32) {
        (GAP as i32, (self.panel_height + GAP + GAP / 2 + 2) as i32)
    }
}

pub struct Drawer {
    window: Window,
    layout: Layout,
}

impl Drawer {
    /// Create a window big enough for both panels and the status line.
    pub fn new(title: &str, layout: Layout) -> Result<Self, Error> {
        let (w, h) = layout.window_size();
        let mut window = Window::new(title, w, h, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        // The UI loop only composes and presents; no need to spin faster.
        window.set_target_fps(60);
        Ok(Self { window, layout })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Push the composed screen to the window.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    pub fn sepia_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::S, KeyRepeat::No)
    }

    pub fn edges_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::E, KeyRepeat::No)
    }

    pub fn eyes_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::Y, KeyRepeat::No)
    }

    pub fn snapshot_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::P, KeyRepeat::No)
    }

    pub fn retry_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::R, KeyRepeat::No)
    }
}

/// Redraw the whole screen: both panels and the status text.
/// Panels with no image yet are drawn as flat gray.
pub fn compose(
    screen: &mut FrameBuffer,
    layout: Layout,
    preview: Option<&FrameBuffer>,
    filtered: Option<(&FrameBuffer, DisplayOrientation)>,
    status: &str,
) {
    screen.pixels.fill(BACKGROUND);

    let (px, py) = layout.preview_origin();
    let (pw, ph) = (layout.panel_width, layout.panel_height);
    match preview {
        // Front camera preview is shown mirrored, like a mirror.
        Some(img) => blit_aspect_fill(screen, px, py, pw, ph, img, true),
        None => fill_rect(screen, px, py, pw, ph, EMPTY_PANEL),
    }

    let (fx, fy) = layout.filtered_origin();
    match filtered {
        Some((img, orientation)) => {
            let mirrored = orientation == DisplayOrientation::UpMirrored;
            blit_aspect_fill(screen, fx, fy, pw, ph, img, mirrored)
        }
        None => fill_rect(screen, fx, fy, pw, ph, EMPTY_PANEL),
    }

    let (tx, ty) = layout.hud_origin();
    draw_text_5x7(screen, tx, ty, status, 0x00_FF_FF_FF);
}

/// Scale `src` to cover the `w` x `h` rectangle at (x0, y0), cropping the
/// overflow evenly on both sides (nearest neighbour).
pub fn blit_aspect_fill(
    dst: &mut FrameBuffer,
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
    src: &FrameBuffer,
    mirrored: bool,
) {
    if src.width == 0 || src.height == 0 || w == 0 || h == 0 {
        return;
    }
    let scale = (w as f32 / src.width as f32).max(h as f32 / src.height as f32);
    let src_x0 = (src.width as f32 - w as f32 / scale) / 2.0;
    let src_y0 = (src.height as f32 - h as f32 / scale) / 2.0;

    for dy in 0..h {
        let ty = y0 + dy;
        if ty >= dst.height {
            break;
        }
        let sy = ((src_y0 + (dy as f32 + 0.5) / scale) as usize).min(src.height - 1);
        for dx in 0..w {
            let tx = x0 + dx;
            if tx >= dst.width {
                break;
            }
            let mut sx = ((src_x0 + (dx as f32 + 0.5) / scale) as usize).min(src.width - 1);
            if mirrored {
                sx = src.width - 1 - sx;
            }
            dst.pixels[ty * dst.width + tx] = src.get(sx, sy);
        }
    }
}

fn fill_rect(fb: &mut FrameBuffer, x0: usize, y0: usize, w: usize, h: usize, color: u32) {
    for y in y0..(y0 + h).min(fb.height) {
        for x in x0..(x0 + w).min(fb.width) {
            fb.pixels[y * fb.width + x] = color;
        }
    }
}

/* ---------- Software drawing: pixels, tiny bitmap font ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
pub(crate) fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/* ---------- 5x7 bitmap font (digits, A-Z, a little punctuation) ---------- */

/// Return a 5x7 glyph bitmap. Lowercase letters map to uppercase.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'B' => g!(0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'J' => g!(0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'Q' => g!(0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),
        'X' => g!(0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001),
        'Y' => g!(0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100),
        'Z' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '/' => g!(0b00001,0b00001,0b00010,0b00100,0b01000,0b10000,0b10000),

        _ => None,
    }
}

/// Draw a single 5x7 character at (x,y), with a 1-pixel black shadow.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    if let Some(rows) = glyph5x7(ch) {
        for (pass_color, offset) in [(0x00000000, 1), (color, 0)] {
            for (ry, rowbits) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if (rowbits & (1 << (4 - rx))) != 0 {
                        put_pixel(fb, x + rx + offset, y + ry as i32 + offset, pass_color);
                    }
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs, 1 pixel apart.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += 6;
    }
}
