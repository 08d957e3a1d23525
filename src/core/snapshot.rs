//! Deterministic snapshot generation
//!
//! Snapshots capture what the framebuffer shows as a text grid plus the
//! cursor, in a serializable format for testing and for the headless
//! runner. Given the same byte stream the terminal must produce identical
//! snapshots.

use serde::{Deserialize, Serialize};

use super::framebuffer::Framebuffer;
use super::geometry::{CursorPosition, ScreenGeometry};
use super::surface::DisplaySurface;

/// A snapshot of the visible screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Screen and font cell dimensions
    pub geometry: ScreenGeometry,
    /// Cursor in pixels
    pub cursor: CursorPosition,
    /// One string per character row, trailing blanks trimmed
    pub lines: Vec<String>,
}

impl Snapshot {
    /// Capture the current framebuffer contents
    pub fn from_framebuffer(fb: &Framebuffer) -> Self {
        let geometry = ScreenGeometry::from_surface(fb);
        let lines = (0..geometry.rows()).map(|row| fb.row_text(row)).collect();
        Self {
            geometry,
            cursor: fb.cursor(),
            lines,
        }
    }

    /// Cursor as (column, row) in character cells
    pub fn cursor_cell(&self) -> (u16, u16) {
        (
            self.cursor.x.checked_div(self.geometry.char_width).unwrap_or(0),
            self.cursor.y.checked_div(self.geometry.char_height).unwrap_or(0),
        )
    }

    /// Render as plain text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::surface::Resolution;

    #[test]
    fn test_snapshot_text() {
        let mut fb = Framebuffer::with_font(Resolution::R320x240, (8, 16));
        for &c in b"Hi" {
            fb.draw_char(c);
        }
        let snapshot = Snapshot::from_framebuffer(&fb);
        assert_eq!(snapshot.lines.len(), 15);
        assert_eq!(snapshot.lines[0], "Hi");
        assert_eq!(snapshot.cursor_cell(), (2, 0));
        assert!(snapshot.to_text().starts_with("Hi\n\n"));
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut fb = Framebuffer::with_font(Resolution::R320x240, (8, 16));
        fb.draw_char(b'x');
        let snapshot = Snapshot::from_framebuffer(&fb);
        let json = snapshot.to_json().unwrap();
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }
}
