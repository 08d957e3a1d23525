//! Error types for the terminal core and its peripherals

use std::io;
use thiserror::Error;

/// Terminal error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A finite byte source ran dry while a read was blocking on it
    #[error("Byte stream closed")]
    StreamClosed,

    /// Settings store address outside the persisted layout
    #[error("Settings address {0} out of range")]
    SettingsAddress(u8),

    /// No flash chip answered the ID probe
    #[error("Flash chip not detected")]
    FlashMissing,

    /// Flash stayed busy past the readiness deadline
    #[error("Flash not ready after {0} ms")]
    FlashNotReady(u64),

    /// Flash address beyond the chip capacity
    #[error("Flash address {0:#08x} out of range")]
    FlashAddress(u32),
}

/// Result type for terminal operations
pub type Result<T> = std::result::Result<T, Error>;
