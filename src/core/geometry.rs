//! Screen geometry and cursor coordinates
//!
//! Everything here is in pixels. The terminal has no character grid of its
//! own; rows and columns only exist as multiples of the current font cell.

use serde::{Deserialize, Serialize};

use super::surface::DisplaySurface;

/// Cursor position in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: u16,
    pub y: u16,
}

impl CursorPosition {
    /// The top-left corner of the screen
    pub const HOME: CursorPosition = CursorPosition { x: 0, y: 0 };

    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Screen and font cell dimensions
///
/// Derived from the display mode, rotation and font scale. Must be
/// recomputed whenever any of those change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u16,
    pub height: u16,
    pub char_width: u16,
    pub char_height: u16,
}

impl ScreenGeometry {
    pub const fn new(width: u16, height: u16, char_width: u16, char_height: u16) -> Self {
        Self {
            width,
            height,
            char_width,
            char_height,
        }
    }

    /// Read the current geometry back from a surface
    pub fn from_surface<D: DisplaySurface + ?Sized>(surface: &D) -> Self {
        Self {
            width: surface.width(),
            height: surface.height(),
            char_width: surface.font_width(),
            char_height: surface.font_height(),
        }
    }

    /// Largest valid cursor x
    pub fn max_x(&self) -> u16 {
        self.width.saturating_sub(self.char_width)
    }

    /// Largest valid cursor y, the top of the last full row
    pub fn max_y(&self) -> u16 {
        self.height.saturating_sub(self.char_height)
    }

    /// Number of whole character columns
    pub fn columns(&self) -> u16 {
        self.width.checked_div(self.char_width).unwrap_or(0)
    }

    /// Number of whole character rows
    pub fn rows(&self) -> u16 {
        self.height.checked_div(self.char_height).unwrap_or(0)
    }

    /// Clamp signed pixel coordinates into the valid cursor range
    pub fn clamp(&self, x: i32, y: i32) -> CursorPosition {
        CursorPosition {
            x: x.clamp(0, i32::from(self.max_x())) as u16,
            y: y.clamp(0, i32::from(self.max_y())) as u16,
        }
    }

    /// Whether a glyph drawn at `pos` would hang off the bottom edge
    pub fn is_below_last_row(&self, pos: CursorPosition) -> bool {
        u32::from(pos.y) + u32::from(self.char_height) > u32::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_limits() {
        let geom = ScreenGeometry::new(800, 480, 8, 16);
        assert_eq!(geom.max_x(), 792);
        assert_eq!(geom.max_y(), 464);
        assert_eq!(geom.columns(), 100);
        assert_eq!(geom.rows(), 30);
    }

    #[test]
    fn test_geometry_clamp() {
        let geom = ScreenGeometry::new(800, 480, 8, 16);
        assert_eq!(geom.clamp(-8, -16), CursorPosition::HOME);
        assert_eq!(geom.clamp(5000, 5000), CursorPosition::new(792, 464));
        assert_eq!(geom.clamp(80, 32), CursorPosition::new(80, 32));
    }

    #[test]
    fn test_geometry_zero_font() {
        let geom = ScreenGeometry::new(800, 480, 0, 0);
        assert_eq!(geom.columns(), 0);
        assert_eq!(geom.rows(), 0);
    }

    #[test]
    fn test_below_last_row() {
        let geom = ScreenGeometry::new(80, 40, 8, 16);
        assert!(!geom.is_below_last_row(CursorPosition::new(0, 16)));
        assert!(geom.is_below_last_row(CursorPosition::new(0, 32)));
        assert!(geom.is_below_last_row(CursorPosition::new(0, 40)));
    }
}
