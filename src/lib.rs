//! Rasterterm Library
//!
//! Firmware core of a serial VT100/ANSI display terminal: bytes arrive from
//! a host over a serial link and are drawn on a raster display with a
//! hardware text cursor and block-transfer scrolling.
//!
//! - `core`: display surface capability, geometry, software framebuffer
//! - `parser`: escape sequence parser for the supported VT100 subset
//! - `engine`: cursor movement, erasing and scrolling in pixel space
//! - `app`: host configuration, persisted settings, interactive setup
//! - `input`: keyboard and touch events, bounded event queue
//! - `touch`: serial flash driver and touch firmware bring-up
//! - `terminal`: the dispatcher tying it all together

pub mod app;
pub mod core;
pub mod engine;
pub mod error;
pub mod input;
pub mod parser;
pub mod serial;
pub mod terminal;
pub mod touch;

pub use error::{Error, Result};
pub use terminal::{Session, Terminal};
