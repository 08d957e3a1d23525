//! Touch controller bring-up
//!
//! The touch controller has no ROM; at boot its microcode is replayed from
//! the external flash as fixed 8-byte records:
//!
//! | Offset | Size | Content          |
//! |--------|------|------------------|
//! | 0      | 1    | register address |
//! | 1      | 3    | padding          |
//! | 4      | 4    | payload          |

pub mod flash;

pub use flash::{EmulatedChip, FlashDevice, SpiBus, TinyFlash, CHIP_BYTES, READY_TIMEOUT};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::input::TouchEvent;

/// Number of microcode records in the firmware image
pub const FW_RECORD_COUNT: usize = 5478;

/// Size of one firmware record in flash
pub const FW_RECORD_LEN: usize = 8;

/// A touch controller accepting microcode records
pub trait TouchController {
    /// Prepare the controller for loading (reset, clear registers)
    fn setup(&mut self);
    /// Write one 4-byte payload to a controller register
    fn load_record(&mut self, addr: u8, payload: [u8; 4]);
    /// Start the loaded firmware
    fn finalize(&mut self);
    /// Next pending touch report, if any
    fn poll_touch(&mut self) -> Option<TouchEvent> {
        None
    }
}

/// Flash plus controller, as wired on the board
pub struct TouchHardware {
    pub flash: Box<dyn FlashDevice>,
    pub controller: Box<dyn TouchController>,
}

impl TouchHardware {
    pub fn new(flash: Box<dyn FlashDevice>, controller: Box<dyn TouchController>) -> Self {
        Self { flash, controller }
    }
}

/// Probe the flash chip, returning its capacity
pub fn probe_flash(flash: &mut dyn FlashDevice) -> Result<u32> {
    match flash.begin() {
        0 => Err(Error::FlashMissing),
        capacity => Ok(capacity),
    }
}

/// Replay the firmware image into the controller
pub fn try_load_touch_firmware(
    flash: &mut dyn FlashDevice,
    controller: &mut dyn TouchController,
) -> Result<()> {
    controller.setup();
    flash.begin_read(0)?;

    for _ in 0..FW_RECORD_COUNT {
        let addr = flash.read_next_byte();
        for _ in 0..3 {
            flash.read_next_byte();
        }
        let payload = [
            flash.read_next_byte(),
            flash.read_next_byte(),
            flash.read_next_byte(),
            flash.read_next_byte(),
        ];
        controller.load_record(addr, payload);
    }
    flash.end_read();

    controller.finalize();
    info!(records = FW_RECORD_COUNT, "Touch firmware loaded");
    Ok(())
}

/// Replay the firmware image; `false` means touch stays disabled
pub fn load_touch_firmware(
    flash: &mut dyn FlashDevice,
    controller: &mut dyn TouchController,
) -> bool {
    match try_load_touch_firmware(flash, controller) {
        Ok(()) => true,
        Err(e) => {
            warn!("Touch firmware load failed: {}", e);
            false
        }
    }
}

/// Controller that records what was loaded into it
#[derive(Debug, Clone, Default)]
pub struct RecordingController {
    pub setup_calls: usize,
    pub records: Vec<(u8, [u8; 4])>,
    pub finalized: bool,
    pub pending: Vec<TouchEvent>,
}

impl TouchController for RecordingController {
    fn setup(&mut self) {
        self.setup_calls += 1;
    }

    fn load_record(&mut self, addr: u8, payload: [u8; 4]) {
        self.records.push((addr, payload));
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }

    fn poll_touch(&mut self) -> Option<TouchEvent> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}

/// Build a flash image from records in the on-flash layout
pub fn encode_firmware_image(records: &[(u8, [u8; 4])]) -> Vec<u8> {
    let mut image = Vec::with_capacity(records.len() * FW_RECORD_LEN);
    for (addr, payload) in records {
        image.push(*addr);
        image.extend_from_slice(&[0, 0, 0]);
        image.extend_from_slice(payload);
    }
    image
}
