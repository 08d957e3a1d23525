//! Persisted terminal settings
//!
//! Settings live in a 9-byte block of non-volatile storage. Address 0 holds
//! a marker; the rest is only trusted when the marker is present.
//!
//! | addr | content                            |
//! |------|------------------------------------|
//! | 0    | marker `0xA5`                      |
//! | 1    | baud code, index into `BAUD_RATES` |
//! | 2    | rotation                           |
//! | 3    | font size                          |
//! | 4..6 | text color, little endian          |
//! | 6    | local echo                         |
//! | 7    | LF→CRLF                            |
//! | 8    | CR→CRLF                            |

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{Color, GREEN};
use crate::engine::LinePolicy;
use crate::error::{Error, Result};
use crate::serial::BAUD_RATES;

/// Size of the persisted layout
pub const SETTINGS_LEN: usize = 9;

/// Value at address 0 when the layout is valid
pub const SETTINGS_MARKER: u8 = 0xA5;

/// Largest valid rotation (portrait)
pub const MAX_ROTATION: u8 = 1;

/// Largest valid font scale
pub const MAX_FONT_SIZE: u8 = 3;

const DEFAULT_BAUD: u32 = 9600;
const DEFAULT_BAUD_CODE: u8 = 3;

const ADDR_MARKER: u8 = 0;
const ADDR_BAUD: u8 = 1;
const ADDR_ROTATION: u8 = 2;
const ADDR_FONT_SIZE: u8 = 3;
const ADDR_COLOR_LO: u8 = 4;
const ADDR_COLOR_HI: u8 = 5;
const ADDR_LOCAL_ECHO: u8 = 6;
const ADDR_LF_CRLF: u8 = 7;
const ADDR_CR_CRLF: u8 = 8;

/// Byte-addressable persistent storage
pub trait SettingsStore {
    fn read_byte(&mut self, addr: u8) -> Result<u8>;
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<()>;
}

fn check_addr(addr: u8) -> Result<usize> {
    let idx = usize::from(addr);
    if idx < SETTINGS_LEN {
        Ok(idx)
    } else {
        Err(Error::SettingsAddress(addr))
    }
}

/// Settings store held in RAM, erased to 0xFF like fresh EEPROM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    bytes: [u8; SETTINGS_LEN],
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            bytes: [0xFF; SETTINGS_LEN],
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: [u8; SETTINGS_LEN]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8; SETTINGS_LEN] {
        &self.bytes
    }
}

impl SettingsStore for MemoryStore {
    fn read_byte(&mut self, addr: u8) -> Result<u8> {
        Ok(self.bytes[check_addr(addr)?])
    }

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<()> {
        self.bytes[check_addr(addr)?] = value;
        Ok(())
    }
}

/// Settings store backed by a small file
///
/// A missing or short file reads as erased storage. Every write rewrites
/// the whole image.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    image: MemoryStore,
}

impl FileStore {
    /// Open (or prepare to create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut bytes = [0xFF; SETTINGS_LEN];
        match fs::read(&path) {
            Ok(data) => {
                let n = data.len().min(SETTINGS_LEN);
                bytes[..n].copy_from_slice(&data[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            path,
            image: MemoryStore::from_bytes(bytes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileStore {
    fn read_byte(&mut self, addr: u8) -> Result<u8> {
        self.image.read_byte(addr)
    }

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<()> {
        self.image.write_byte(addr, value)?;
        fs::write(&self.path, self.image.bytes())?;
        Ok(())
    }
}

/// Map a baud rate to its stored code; unknown rates store as 9600
pub fn encode_baud(baud: u32) -> u8 {
    BAUD_RATES
        .iter()
        .position(|&b| b == baud)
        .map_or(DEFAULT_BAUD_CODE, |i| i as u8)
}

/// Map a stored code to a baud rate; unknown codes read as 9600
pub fn decode_baud(code: u8) -> u32 {
    BAUD_RATES
        .get(usize::from(code))
        .copied()
        .unwrap_or(DEFAULT_BAUD)
}

/// User-configurable terminal settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    pub baud_rate: u32,
    /// 0 = landscape, 1 = portrait
    pub rotation: u8,
    /// Font scale, 0..=3
    pub font_size: u8,
    pub text_color: Color,
    pub local_echo: bool,
    pub lf_to_crlf: bool,
    pub cr_to_crlf: bool,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD,
            rotation: 0,
            font_size: 0,
            text_color: GREEN,
            local_echo: true,
            lf_to_crlf: true,
            cr_to_crlf: true,
        }
    }
}

impl TerminalSettings {
    /// Read settings from the store
    ///
    /// Without the marker the defaults are returned and nothing is written.
    /// Rotation and font size are clamped into range, so a corrupted byte
    /// is not carried into the session or written back by the next save.
    pub fn load<S: SettingsStore + ?Sized>(store: &mut S) -> Result<Self> {
        let mut settings = Self::default();
        if store.read_byte(ADDR_MARKER)? != SETTINGS_MARKER {
            debug!("No settings found in store, using defaults");
            return Ok(settings);
        }

        settings.baud_rate = decode_baud(store.read_byte(ADDR_BAUD)?);
        settings.rotation = store.read_byte(ADDR_ROTATION)?.min(MAX_ROTATION);
        settings.font_size = store.read_byte(ADDR_FONT_SIZE)?.min(MAX_FONT_SIZE);
        settings.text_color = u16::from_le_bytes([
            store.read_byte(ADDR_COLOR_LO)?,
            store.read_byte(ADDR_COLOR_HI)?,
        ]);
        settings.local_echo = store.read_byte(ADDR_LOCAL_ECHO)? != 0;
        settings.lf_to_crlf = store.read_byte(ADDR_LF_CRLF)? != 0;
        settings.cr_to_crlf = store.read_byte(ADDR_CR_CRLF)? != 0;
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Write the marker and the full layout
    pub fn save<S: SettingsStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        let [color_lo, color_hi] = self.text_color.to_le_bytes();
        store.write_byte(ADDR_MARKER, SETTINGS_MARKER)?;
        store.write_byte(ADDR_BAUD, encode_baud(self.baud_rate))?;
        store.write_byte(ADDR_ROTATION, self.rotation)?;
        store.write_byte(ADDR_FONT_SIZE, self.font_size)?;
        store.write_byte(ADDR_COLOR_LO, color_lo)?;
        store.write_byte(ADDR_COLOR_HI, color_hi)?;
        store.write_byte(ADDR_LOCAL_ECHO, u8::from(self.local_echo))?;
        store.write_byte(ADDR_LF_CRLF, u8::from(self.lf_to_crlf))?;
        store.write_byte(ADDR_CR_CRLF, u8::from(self.cr_to_crlf))?;
        info!("Settings saved");
        Ok(())
    }

    /// Invalidate stored settings by clearing only the marker
    ///
    /// The next load falls back to defaults; the remaining bytes stay as
    /// they are until the next save.
    pub fn restore_defaults<S: SettingsStore + ?Sized>(store: &mut S) -> Result<()> {
        store.write_byte(ADDR_MARKER, 0)?;
        info!("Stored settings cleared");
        Ok(())
    }

    /// CR/LF translation for the engine
    pub fn line_policy(&self) -> LinePolicy {
        LinePolicy {
            lf_to_crlf: self.lf_to_crlf,
            cr_to_crlf: self.cr_to_crlf,
        }
    }
}
