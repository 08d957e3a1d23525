//! Serial link abstraction
//!
//! The terminal talks to its host over a byte stream. Reads come in two
//! flavours: a non-blocking poll used by the dispatcher, and a blocking read
//! used by the parser while it drains the rest of an escape sequence. The
//! blocking read has no timeout; on a live link an unfinished sequence
//! stalls input forever. Finite sources (test scripts, files) report
//! themselves closed instead of spinning.

use std::collections::VecDeque;
use std::io::{self, BufReader, Read, Write};

use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Baud rates the device can be configured for
pub const BAUD_RATES: [u32; 6] = [1200, 2400, 4800, 9600, 19200, 115200];

/// Inbound half of the serial link
pub trait ByteSource {
    /// Return the next byte if one is available, without waiting
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Whether the source can never produce another byte
    ///
    /// Live links never close; this is only true for finite sources.
    fn is_closed(&self) -> bool {
        false
    }

    /// Wait for the next byte
    ///
    /// Busy-polls [`ByteSource::try_read_byte`]. Fails only when the source
    /// is closed.
    fn read_byte(&mut self) -> Result<u8> {
        loop {
            if let Some(byte) = self.try_read_byte() {
                return Ok(byte);
            }
            if self.is_closed() {
                return Err(Error::StreamClosed);
            }
            std::hint::spin_loop();
        }
    }
}

/// Outbound half of the serial link
pub trait ByteSink {
    /// Send one byte to the host
    fn write_byte(&mut self, byte: u8);

    /// Reconfigure the line speed
    fn set_baud_rate(&mut self, baud: u32);
}

/// A full-duplex serial link
pub trait SerialLink: ByteSource + ByteSink {}

impl<T: ByteSource + ByteSink> SerialLink for T {}

/// A finite, scripted serial link
///
/// Bytes queued with [`ScriptedStream::push`] are delivered in order; once
/// they run out the stream reports itself closed. Everything the terminal
/// sends is recorded.
#[derive(Debug, Default, Clone)]
pub struct ScriptedStream {
    input: VecDeque<u8>,
    sent: Vec<u8>,
    baud_rate: u32,
    consumed: usize,
}

impl ScriptedStream {
    /// Create a stream that will deliver `input`
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            sent: Vec::new(),
            baud_rate: 0,
            consumed: 0,
        }
    }

    /// Queue more inbound bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Bytes the terminal has sent
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Inbound bytes not yet read
    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Total inbound bytes read so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Last configured line speed (0 if never set)
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl ByteSource for ScriptedStream {
    fn try_read_byte(&mut self) -> Option<u8> {
        let byte = self.input.pop_front()?;
        self.consumed += 1;
        Some(byte)
    }

    fn is_closed(&self) -> bool {
        self.input.is_empty()
    }
}

impl ByteSink for ScriptedStream {
    fn write_byte(&mut self, byte: u8) {
        self.sent.push(byte);
    }

    fn set_baud_rate(&mut self, baud: u32) {
        self.baud_rate = baud;
    }
}

/// A serial link backed by `std::io` reader and writer
///
/// Used by the headless runner to replay captured host output.
#[derive(Debug)]
pub struct IoStream<R: Read, W: Write> {
    reader: BufReader<R>,
    writer: W,
    closed: bool,
}

impl<R: Read, W: Write> IoStream<R, W> {
    /// Wrap a reader (inbound) and writer (outbound)
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            closed: false,
        }
    }
}

impl<R: Read, W: Write> ByteSource for IoStream<R, W> {
    fn try_read_byte(&mut self) -> Option<u8> {
        if self.closed {
            return None;
        }
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.closed = true;
                    return None;
                }
                Ok(_) => return Some(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Serial read failed, closing stream: {}", e);
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<R: Read, W: Write> ByteSink for IoStream<R, W> {
    fn write_byte(&mut self, byte: u8) {
        if let Err(e) = self.writer.write_all(&[byte]) {
            warn!("Serial write failed: {}", e);
        }
    }

    fn set_baud_rate(&mut self, baud: u32) {
        trace!("Baud rate {} ignored on host stream", baud);
    }
}
