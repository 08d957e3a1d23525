//! In-memory display surface
//!
//! A software model of the display controller. Every pixel remembers the
//! color it was painted with and, if a glyph painted it, which glyph. That
//! keeps glyph placement observable without rasterizing a font, and block
//! transfers move glyphs exactly as they move pixels.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::geometry::CursorPosition;
use super::surface::{
    BlockTransfer, Color, CursorStyle, Direction, DisplaySurface, Rect, Resolution, BLACK, WHITE,
};

/// Base font cell size at scale 0
pub const BASE_FONT: (u16, u16) = (8, 16);

/// A tagged pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pixel {
    pub color: Color,
    /// Glyph that painted this pixel, 0 if none
    pub glyph: u8,
}

/// Operation counters, useful for asserting side effects in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceStats {
    pub block_transfers: usize,
    pub fills: usize,
    pub glyphs: usize,
    pub pauses: usize,
    pub paused: Duration,
}

/// Software framebuffer implementing [`DisplaySurface`]
#[derive(Debug, Clone)]
pub struct Framebuffer {
    resolution: Resolution,
    rotation: u8,
    font_scale: u8,
    base_font: (u16, u16),
    width: u16,
    height: u16,
    pixels: Vec<Pixel>,
    cursor: CursorPosition,
    text_color: Color,
    cursor_style: CursorStyle,
    cursor_visible: bool,
    stats: SurfaceStats,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new(Resolution::default())
    }
}

impl Framebuffer {
    /// Create a blank framebuffer at a native resolution
    pub fn new(resolution: Resolution) -> Self {
        Self::with_font(resolution, BASE_FONT)
    }

    /// Create a blank framebuffer with a custom base font cell
    pub fn with_font(resolution: Resolution, base_font: (u16, u16)) -> Self {
        let (width, height) = resolution.size();
        let mut fb = Self {
            resolution,
            rotation: 0,
            font_scale: 0,
            base_font,
            width,
            height,
            pixels: Vec::new(),
            cursor: CursorPosition::HOME,
            text_color: WHITE,
            cursor_style: CursorStyle::default(),
            cursor_visible: false,
            stats: SurfaceStats::default(),
        };
        fb.reallocate();
        fb
    }

    fn reallocate(&mut self) {
        let (w, h) = self.resolution.size();
        if self.rotation % 2 == 1 {
            self.width = h;
            self.height = w;
        } else {
            self.width = w;
            self.height = h;
        }
        self.pixels = vec![
            Pixel {
                color: BLACK,
                glyph: 0
            };
            usize::from(self.width) * usize::from(self.height)
        ];
        self.cursor = CursorPosition::HOME;
    }

    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    /// Pixel at (x, y), `None` outside the surface
    pub fn pixel(&self, x: u16, y: u16) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[self.index(x, y)])
    }

    /// Glyph at a character cell, sampled from the cell's top-left pixel
    pub fn glyph_at(&self, col: u16, row: u16) -> Option<u8> {
        let x = col.checked_mul(self.font_width())?;
        let y = row.checked_mul(self.font_height())?;
        self.pixel(x, y).map(|p| p.glyph)
    }

    /// Text of one character row, trailing blanks trimmed
    pub fn row_text(&self, row: u16) -> String {
        let cols = self.width / self.font_width().max(1);
        let mut s: String = (0..cols)
            .map(|col| match self.glyph_at(col, row) {
                Some(g) if g != 0 => g as char,
                _ => ' ',
            })
            .collect();
        s.truncate(s.trim_end().len());
        s
    }

    /// Whether every pixel of `rect` has `color` and no glyph
    pub fn is_filled(&self, rect: Rect, color: Color) -> bool {
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        (rect.y..y_end).all(|y| {
            (rect.x..x_end).all(|x| {
                let p = self.pixels[self.index(x, y)];
                p.color == color && p.glyph == 0
            })
        })
    }

    /// Copy of a rectangular region, row-major
    pub fn region(&self, rect: Rect) -> Vec<Pixel> {
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        let mut out = Vec::new();
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                out.push(self.pixels[self.index(x, y)]);
            }
        }
        out
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    pub fn text_color(&self) -> Color {
        self.text_color
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    pub fn font_scale(&self) -> u8 {
        self.font_scale
    }

    /// Hardware cursor style and visibility
    pub fn cursor_visible(&self) -> (CursorStyle, bool) {
        (self.cursor_style, self.cursor_visible)
    }

    /// Top-left corner of a transfer's source and destination
    fn top_left(transfer: &BlockTransfer) -> Option<(i32, i32, i32, i32)> {
        let (w, h) = (i32::from(transfer.width), i32::from(transfer.height));
        let (sx, sy) = (i32::from(transfer.source.x), i32::from(transfer.source.y));
        let (dx, dy) = (i32::from(transfer.dest.x), i32::from(transfer.dest.y));
        let corners = match transfer.direction {
            Direction::Forward => (sx, sy, dx, dy),
            Direction::Backward => (sx + 1 - w, sy + 1 - h, dx + 1 - w, dy + 1 - h),
        };
        let (a, b, c, d) = corners;
        if a < 0 || b < 0 || c < 0 || d < 0 {
            return None;
        }
        Some(corners)
    }
}

impl DisplaySurface for Framebuffer {
    fn set_mode(&mut self, resolution: Resolution) {
        self.resolution = resolution;
        self.reallocate();
    }

    fn set_rotation(&mut self, rotation: u8) {
        self.rotation = rotation % 4;
        self.reallocate();
    }

    fn set_font_scale(&mut self, scale: u8) {
        self.font_scale = scale.min(3);
    }

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn font_width(&self) -> u16 {
        self.base_font.0 * (u16::from(self.font_scale) + 1)
    }

    fn font_height(&self) -> u16 {
        self.base_font.1 * (u16::from(self.font_scale) + 1)
    }

    fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    fn set_cursor(&mut self, pos: CursorPosition) {
        self.cursor = pos;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.stats.fills += 1;
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let idx = self.index(x, y);
                self.pixels[idx] = Pixel { color, glyph: 0 };
            }
        }
    }

    fn block_transfer(&mut self, transfer: BlockTransfer) {
        self.stats.block_transfers += 1;
        let Some((sx, sy, dx, dy)) = Self::top_left(&transfer) else {
            warn!("Block transfer corner off surface: {:?}", transfer);
            return;
        };
        let (w, h) = (i32::from(self.width), i32::from(self.height));
        let mut staged = Vec::with_capacity(usize::from(transfer.width) * usize::from(transfer.height));
        for row in 0..i32::from(transfer.height) {
            for col in 0..i32::from(transfer.width) {
                let (x, y) = (sx + col, sy + row);
                let p = if x < w && y < h {
                    Some(self.pixels[self.index(x as u16, y as u16)])
                } else {
                    None
                };
                staged.push(p);
            }
        }
        let mut staged = staged.into_iter();
        for row in 0..i32::from(transfer.height) {
            for col in 0..i32::from(transfer.width) {
                let (x, y) = (dx + col, dy + row);
                if let Some(Some(p)) = staged.next() {
                    if x < w && y < h {
                        let idx = self.index(x as u16, y as u16);
                        self.pixels[idx] = p;
                    }
                }
            }
        }
        trace!(
            "Block transfer {}x{} ({},{}) -> ({},{})",
            transfer.width,
            transfer.height,
            sx,
            sy,
            dx,
            dy
        );
    }

    fn draw_char(&mut self, c: u8) {
        self.stats.glyphs += 1;
        let (cw, ch) = (self.font_width(), self.font_height());
        let CursorPosition { x, y } = self.cursor;
        let x_end = x.saturating_add(cw).min(self.width);
        let y_end = y.saturating_add(ch).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                let idx = self.index(px, py);
                self.pixels[idx] = Pixel {
                    color: self.text_color,
                    glyph: c,
                };
            }
        }

        // Advance, wrapping to the next row; the row may be off screen.
        let mut next_x = u32::from(x) + u32::from(cw);
        let mut next_y = u32::from(y);
        if next_x + u32::from(cw) > u32::from(self.width) {
            next_x = 0;
            next_y += u32::from(ch);
        }
        self.cursor = CursorPosition {
            x: next_x.min(u32::from(u16::MAX)) as u16,
            y: next_y.min(u32::from(u16::MAX)) as u16,
        };
    }

    fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    fn set_cursor_visible(&mut self, style: CursorStyle, on: bool) {
        self.cursor_style = style;
        self.cursor_visible = on;
    }

    fn pause(&mut self, duration: Duration) {
        // Transfers here are synchronous; just account for the wait.
        self.stats.pauses += 1;
        self.stats.paused += duration;
    }
}
