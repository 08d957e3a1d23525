//! Terminal Core Module
//!
//! Pixel-space model of the display. This module contains:
//! - Screen geometry and cursor coordinates
//! - The display surface capability the terminal draws through
//! - A software framebuffer implementing that capability
//! - Deterministic snapshot generation

mod framebuffer;
mod geometry;
mod snapshot;
mod surface;

pub use framebuffer::{Framebuffer, Pixel, SurfaceStats, BASE_FONT};
pub use geometry::{CursorPosition, ScreenGeometry};
pub use snapshot::Snapshot;
pub use surface::{
    BlockTransfer, Color, CursorStyle, Direction, DisplaySurface, Rect, Resolution, BLACK, GREEN,
    WHITE,
};
