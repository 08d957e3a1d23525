//! Application layer
//!
//! Host configuration, persisted device settings and the interactive setup
//! dialogue.

pub mod config;
pub mod settings;
pub mod setup;

pub use config::{DisplayConfig, HostConfig};
pub use settings::{
    decode_baud, encode_baud, FileStore, MemoryStore, SettingsStore, TerminalSettings,
    MAX_FONT_SIZE, MAX_ROTATION, SETTINGS_LEN, SETTINGS_MARKER,
};
pub use setup::{AnswerSource, KeyboardOrStream, SetupFlow, SetupOutcome, SetupResult};
