//! Display surface capability
//!
//! The terminal draws through this trait and never touches pixels itself.
//! The shape of the API follows a RA8875-class display controller: text is
//! drawn at a hardware cursor that advances on its own, and scrolling is
//! done with the controller's block transfer engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::geometry::CursorPosition;

/// RGB565 color
pub type Color = u16;

pub const BLACK: Color = 0x0000;
pub const GREEN: Color = 0x07E0;
pub const WHITE: Color = 0xFFFF;

/// Native display resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    R800x480,
    R480x272,
    R320x240,
}

impl Resolution {
    /// Width and height in landscape orientation
    pub fn size(self) -> (u16, u16) {
        match self {
            Resolution::R800x480 => (800, 480),
            Resolution::R480x272 => (480, 272),
            Resolution::R320x240 => (320, 240),
        }
    }

    /// Resolution with the given landscape size, if supported
    pub fn from_size(width: u16, height: u16) -> Option<Self> {
        [
            Resolution::R800x480,
            Resolution::R480x272,
            Resolution::R320x240,
        ]
        .into_iter()
        .find(|r| r.size() == (width, height))
    }
}

/// Hardware text cursor shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorStyle {
    #[default]
    Underline,
    Block,
    Bar,
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Copy order of a block transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Copy from the top-left corner; `source` and `dest` name top-left corners
    Forward,
    /// Copy from the bottom-right corner; `source` and `dest` name bottom-right corners
    Backward,
}

/// A block transfer request
///
/// Overlapping moves must pick the direction that reads each pixel before
/// it is overwritten: forward for moving content up, backward for moving
/// it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransfer {
    pub source: CursorPosition,
    pub dest: CursorPosition,
    pub width: u16,
    pub height: u16,
    pub direction: Direction,
}

/// A raster display that can draw text and move pixel blocks
pub trait DisplaySurface {
    /// Select the native resolution
    fn set_mode(&mut self, resolution: Resolution);

    /// Set rotation (0 = landscape, 1 = portrait)
    fn set_rotation(&mut self, rotation: u8);

    /// Set font scale (0 = 1x .. 3 = 4x)
    fn set_font_scale(&mut self, scale: u8);

    fn width(&self) -> u16;
    fn height(&self) -> u16;
    fn font_width(&self) -> u16;
    fn font_height(&self) -> u16;

    /// Current text cursor
    fn cursor(&self) -> CursorPosition;

    fn set_cursor(&mut self, pos: CursorPosition);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Start a block transfer
    ///
    /// On real hardware the transfer runs asynchronously to later drawing
    /// commands; see [`DisplaySurface::pause`].
    fn block_transfer(&mut self, transfer: BlockTransfer);

    /// Draw a glyph at the cursor and advance it
    ///
    /// The surface owns column advance and wrap. After wrapping off the last
    /// row the cursor may be left below the visible area.
    fn draw_char(&mut self, c: u8);

    fn set_text_color(&mut self, color: Color);

    fn set_cursor_visible(&mut self, style: CursorStyle, on: bool);

    /// Wait for in-flight operations to settle
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_sizes() {
        assert_eq!(Resolution::default().size(), (800, 480));
        assert_eq!(Resolution::R480x272.size(), (480, 272));
        assert_eq!(Resolution::from_size(320, 240), Some(Resolution::R320x240));
        assert_eq!(Resolution::from_size(640, 480), None);
    }

    #[test]
    fn test_rect_empty() {
        assert!(Rect::new(0, 0, 0, 16).is_empty());
        assert!(Rect::new(4, 4, 8, 0).is_empty());
        assert!(!Rect::new(0, 0, 1, 1).is_empty());
    }
}
