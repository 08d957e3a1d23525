//! Read-only driver for the W25Q80BV serial flash
//!
//! The chip stores the touch controller microcode. Only what bring-up needs
//! is implemented: JEDEC ID probe, busy polling and sequential reads.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Capacity of the only supported part
pub const CHIP_BYTES: u32 = 1024 * 1024;

/// Default deadline for the busy flag to clear
pub const READY_TIMEOUT: Duration = Duration::from_millis(1000);

const CMD_READDATA: u8 = 0x03;
const CMD_READSTAT1: u8 = 0x05;
const CMD_ID: u8 = 0x90;

const STAT_BUSY: u8 = 0x01;

const MANUFACTURER_WINBOND: u8 = 0xEF;
const DEVICE_W25Q80: u8 = 0x13;

/// Full-duplex SPI bus with a dedicated chip-select line
pub trait SpiBus {
    /// Assert chip select
    fn select(&mut self);
    /// Release chip select
    fn deselect(&mut self);
    /// Clock one byte out and return the byte clocked in
    fn transfer(&mut self, byte: u8) -> u8;
}

/// Sequential-read flash used by the touch bring-up
pub trait FlashDevice {
    /// Probe the chip; returns its capacity in bytes, 0 if unrecognized
    fn begin(&mut self) -> u32;
    /// Start a sequential read at `addr`; the chip stays selected
    fn begin_read(&mut self, addr: u32) -> Result<()>;
    fn read_next_byte(&mut self) -> u8;
    fn end_read(&mut self);
}

/// Minimal W25Q80BV driver
#[derive(Debug)]
pub struct TinyFlash<B> {
    bus: B,
    ready_timeout: Duration,
}

impl<B: SpiBus> TinyFlash<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            ready_timeout: READY_TIMEOUT,
        }
    }

    pub fn with_ready_timeout(bus: B, ready_timeout: Duration) -> Self {
        Self { bus, ready_timeout }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn command(&mut self, cmd: u8) {
        self.bus.select();
        self.bus.transfer(cmd);
    }

    /// Probe the JEDEC ID
    pub fn begin(&mut self) -> u32 {
        self.command(CMD_ID);
        // Three dummy address bytes precede the manufacturer ID
        let mut manufacturer = 0;
        for _ in 0..4 {
            manufacturer = self.bus.transfer(0);
        }
        let device = self.bus.transfer(0);
        self.bus.deselect();

        debug!(manufacturer, device, "Flash ID probe");
        if manufacturer == MANUFACTURER_WINBOND && device == DEVICE_W25Q80 {
            CHIP_BYTES
        } else {
            0
        }
    }

    /// Poll the status register until the busy flag clears or `timeout` passes
    pub fn wait_for_ready(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.command(CMD_READSTAT1);
            let status = self.bus.transfer(0);
            self.bus.deselect();
            if status & STAT_BUSY == 0 {
                return true;
            }
            if Instant::now() > deadline {
                return false;
            }
        }
    }

    pub fn begin_read(&mut self, addr: u32) -> Result<()> {
        if addr >= CHIP_BYTES {
            return Err(Error::FlashAddress(addr));
        }
        if !self.wait_for_ready(self.ready_timeout) {
            return Err(Error::FlashNotReady(self.ready_timeout.as_millis() as u64));
        }
        self.command(CMD_READDATA);
        let [_, high, mid, low] = addr.to_be_bytes();
        self.bus.transfer(high);
        self.bus.transfer(mid);
        self.bus.transfer(low);
        trace!(addr, "Flash read started");
        Ok(())
    }

    pub fn read_next_byte(&mut self) -> u8 {
        self.bus.transfer(0)
    }

    pub fn end_read(&mut self) {
        self.bus.deselect();
    }
}

impl<B: SpiBus> FlashDevice for TinyFlash<B> {
    fn begin(&mut self) -> u32 {
        TinyFlash::begin(self)
    }

    fn begin_read(&mut self, addr: u32) -> Result<()> {
        TinyFlash::begin_read(self, addr)
    }

    fn read_next_byte(&mut self) -> u8 {
        TinyFlash::read_next_byte(self)
    }

    fn end_read(&mut self) {
        TinyFlash::end_read(self)
    }
}

/// In-memory model of a W25Q80BV on the far side of an SPI bus
///
/// Answers the ID, status and read commands from a byte image. Used by the
/// headless runner and tests in place of real hardware.
#[derive(Debug, Clone)]
pub struct EmulatedChip {
    image: Vec<u8>,
    id: (u8, u8),
    /// Status polls that report busy before the chip becomes ready
    busy_polls: Option<usize>,
    selected: bool,
    command: Option<u8>,
    phase: usize,
    addr: u32,
}

impl EmulatedChip {
    /// A genuine W25Q80BV holding `image` at address 0
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            id: (MANUFACTURER_WINBOND, DEVICE_W25Q80),
            busy_polls: Some(0),
            selected: false,
            command: None,
            phase: 0,
            addr: 0,
        }
    }

    /// A chip that answers the ID probe with other IDs
    pub fn with_id(mut self, manufacturer: u8, device: u8) -> Self {
        self.id = (manufacturer, device);
        self
    }

    /// Report busy for `polls` status reads, or forever with `None`
    pub fn busy_for(mut self, polls: Option<usize>) -> Self {
        self.busy_polls = polls;
        self
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    fn status(&mut self) -> u8 {
        match self.busy_polls.as_mut() {
            Some(0) => 0,
            Some(n) => {
                *n -= 1;
                STAT_BUSY
            }
            None => STAT_BUSY,
        }
    }
}

impl SpiBus for EmulatedChip {
    fn select(&mut self) {
        self.selected = true;
        self.command = None;
        self.phase = 0;
        self.addr = 0;
    }

    fn deselect(&mut self) {
        self.selected = false;
        self.command = None;
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        if !self.selected {
            return 0xFF;
        }
        let Some(cmd) = self.command else {
            self.command = Some(byte);
            return 0;
        };
        let phase = self.phase;
        self.phase += 1;
        match cmd {
            CMD_ID => match phase {
                3 => self.id.0,
                4 => self.id.1,
                _ => 0,
            },
            CMD_READSTAT1 => self.status(),
            CMD_READDATA if phase < 3 => {
                self.addr = (self.addr << 8) | u32::from(byte);
                0
            }
            CMD_READDATA => {
                let value = self.image.get(self.addr as usize).copied().unwrap_or(0xFF);
                self.addr = self.addr.wrapping_add(1);
                value
            }
            _ => 0xFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_detects_chip() {
        let mut flash = TinyFlash::new(EmulatedChip::new(vec![]));
        assert_eq!(flash.begin(), CHIP_BYTES);
        assert!(!flash.bus().is_selected());
    }

    #[test]
    fn test_begin_rejects_unknown_id() {
        let mut flash = TinyFlash::new(EmulatedChip::new(vec![]).with_id(0xC2, 0x13));
        assert_eq!(flash.begin(), 0);
    }

    #[test]
    fn test_sequential_read() {
        let mut flash = TinyFlash::new(EmulatedChip::new((0u8..=255).collect()));
        flash.begin_read(0x10).unwrap();
        assert!(flash.bus().is_selected());
        assert_eq!(flash.read_next_byte(), 0x10);
        assert_eq!(flash.read_next_byte(), 0x11);
        flash.end_read();
        assert!(!flash.bus().is_selected());
    }

    #[test]
    fn test_read_past_image_returns_erased() {
        let mut flash = TinyFlash::new(EmulatedChip::new(vec![1]));
        flash.begin_read(1).unwrap();
        assert_eq!(flash.read_next_byte(), 0xFF);
    }

    #[test]
    fn test_begin_read_address_out_of_range() {
        let mut flash = TinyFlash::new(EmulatedChip::new(vec![]));
        assert!(matches!(
            flash.begin_read(CHIP_BYTES),
            Err(Error::FlashAddress(a)) if a == CHIP_BYTES
        ));
    }

    #[test]
    fn test_wait_for_ready_after_busy() {
        let chip = EmulatedChip::new(vec![]).busy_for(Some(3));
        let mut flash = TinyFlash::new(chip);
        assert!(flash.wait_for_ready(Duration::from_secs(1)));
    }

    #[test]
    fn test_never_ready_times_out() {
        let chip = EmulatedChip::new(vec![]).busy_for(None);
        let mut flash = TinyFlash::with_ready_timeout(chip, Duration::from_millis(5));
        assert!(matches!(flash.begin_read(0), Err(Error::FlashNotReady(5))));
    }
}
