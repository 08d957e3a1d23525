//! Parser State Machine
//!
//! A character-at-a-time classifier for the serial byte stream. Ordinary
//! bytes are classified on their own. An ESC byte starts a synchronous
//! sub-parse that keeps pulling bytes from the same source until the
//! sequence completes or hits an unrecognized terminator; nothing else is
//! read in between and there is no timeout.
//!
//! Grammar:
//! - `ESC [ [digits] [; digits] terminator` - a control sequence
//! - `ESC M`, `ESC L` - scroll up / scroll down
//! - anything else after ESC is discarded

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::action::{Action, ControlAction, CsiCommand};
use crate::error::Result;
use crate::serial::ByteSource;

const ESC: u8 = 0x1B;
const BS: u8 = 0x08;

/// Where the parser is within an escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Normal,
    SawEscape,
    InCsi,
}

/// Transient state of one escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EscapeSequenceState {
    pub mode: Mode,
    pub param1: u16,
    pub param2: u16,
    pub saw_semicolon: bool,
}

impl EscapeSequenceState {
    /// Fold one decimal digit into the current parameter
    ///
    /// A parameter only accepts another digit while it is below 100; later
    /// digits are consumed without changing it.
    fn push_digit(&mut self, digit: u8) {
        let param = if self.saw_semicolon {
            &mut self.param2
        } else {
            &mut self.param1
        };
        if *param < 100 {
            *param = *param * 10 + u16::from(digit);
        }
    }
}

/// Outcome of feeding one byte to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// The sequence needs more bytes
    Continue,
    /// The byte completed an action
    Done(Action),
}

/// The escape-sequence parser
#[derive(Debug, Default, Clone)]
pub struct Parser {
    state: EscapeSequenceState,
}

impl Parser {
    /// Create a new parser in the normal state
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the parser, discarding any partial sequence
    pub fn reset(&mut self) {
        self.state = EscapeSequenceState::default();
    }

    /// Whether a sequence is in progress and waiting for more bytes
    pub fn is_awaiting_terminator(&self) -> bool {
        self.state.mode != Mode::Normal
    }

    /// Current escape sequence state
    pub fn state(&self) -> EscapeSequenceState {
        self.state
    }

    /// Classify `byte`, draining the rest of an escape sequence from `source`
    ///
    /// Fails only if `source` closes mid-sequence. The partial sequence is
    /// kept; call [`Parser::resume`] once more bytes can arrive.
    pub fn advance<S: ByteSource + ?Sized>(&mut self, byte: u8, source: &mut S) -> Result<Action> {
        let mut byte = byte;
        loop {
            match self.step(byte) {
                Step::Done(action) => return Ok(action),
                Step::Continue => byte = source.read_byte()?,
            }
        }
    }

    /// Continue a pending sequence from `source`
    ///
    /// Returns `Ok(Action::Nop)` immediately if nothing is pending.
    pub fn resume<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<Action> {
        if !self.is_awaiting_terminator() {
            return Ok(Action::Nop);
        }
        let byte = source.read_byte()?;
        self.advance(byte, source)
    }

    /// Feed a complete buffer without a live source
    ///
    /// Sequences split at the end of `data` stay pending for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Action> {
        let mut actions = Vec::with_capacity(data.len());
        for &byte in data {
            if let Step::Done(action) = self.step(byte) {
                actions.push(action);
            }
        }
        actions
    }

    fn step(&mut self, byte: u8) -> Step {
        match self.state.mode {
            Mode::Normal => self.step_normal(byte),
            Mode::SawEscape => self.step_escape(byte),
            Mode::InCsi => self.step_csi(byte),
        }
    }

    fn step_normal(&mut self, byte: u8) -> Step {
        let action = match byte {
            b'\r' => Action::Control(ControlAction::CarriageReturn),
            b'\n' => Action::Control(ControlAction::LineFeed),
            BS => Action::Control(ControlAction::Backspace),
            ESC => {
                self.state = EscapeSequenceState {
                    mode: Mode::SawEscape,
                    ..Default::default()
                };
                return Step::Continue;
            }
            0x20..=0x7E => Action::Print(byte),
            // Other C0 controls, DEL and 8-bit bytes are dropped
            _ => {
                trace!("Dropped byte {:#04x}", byte);
                Action::Nop
            }
        };
        Step::Done(action)
    }

    fn step_escape(&mut self, byte: u8) -> Step {
        let action = match byte {
            b'[' => {
                self.state.mode = Mode::InCsi;
                return Step::Continue;
            }
            b'M' => Action::Control(ControlAction::ScrollUp),
            b'L' => Action::Control(ControlAction::ScrollDown),
            _ => {
                debug!("Discarded ESC {:#04x}", byte);
                Action::Nop
            }
        };
        self.reset();
        Step::Done(action)
    }

    fn step_csi(&mut self, byte: u8) -> Step {
        match byte {
            b'0'..=b'9' => {
                self.state.push_digit(byte - b'0');
                return Step::Continue;
            }
            b';' if !self.state.saw_semicolon => {
                self.state.saw_semicolon = true;
                return Step::Continue;
            }
            _ => {}
        }

        let EscapeSequenceState { param1, param2, .. } = self.state;
        self.reset();
        match CsiCommand::from_parts(byte, param1, param2) {
            Some(cmd) => {
                debug!("CSI {};{} {} -> {:?}", param1, param2, byte as char, cmd);
                Step::Done(Action::Control(ControlAction::Csi(cmd)))
            }
            None => {
                debug!("Discarded CSI {};{} {:#04x}", param1, param2, byte);
                Step::Done(Action::Nop)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::action::EraseMode;
    use crate::serial::ScriptedStream;

    fn csi(cmd: CsiCommand) -> Action {
        Action::Control(ControlAction::Csi(cmd))
    }

    /// Parse a whole script through the blocking path
    fn parse_all(input: &[u8]) -> Vec<Action> {
        let mut source = ScriptedStream::new(input);
        let mut parser = Parser::new();
        let mut actions = Vec::new();
        while let Some(byte) = source.try_read_byte() {
            actions.push(parser.advance(byte, &mut source).unwrap());
        }
        actions
    }

    #[test]
    fn test_printable_and_controls() {
        let actions = parse_all(b"a\r\n\x08~");
        assert_eq!(
            actions,
            vec![
                Action::Print(b'a'),
                Action::Control(ControlAction::CarriageReturn),
                Action::Control(ControlAction::LineFeed),
                Action::Control(ControlAction::Backspace),
                Action::Print(b'~'),
            ]
        );
    }

    #[test]
    fn test_dropped_bytes() {
        let actions = parse_all(&[0x00, 0x07, 0x09, 0x7F, 0x80, 0xFF]);
        assert!(actions.iter().all(Action::is_nop));
        assert_eq!(actions.len(), 6);
    }

    #[test]
    fn test_escape_consumes_whole_sequence() {
        // One action for the whole sequence, one for the trailing 'x'
        let actions = parse_all(b"\x1b[12;34Hx");
        assert_eq!(
            actions,
            vec![csi(CsiCommand::Position { line: 12, col: 34 }), Action::Print(b'x')]
        );
    }

    #[test]
    fn test_cursor_moves() {
        assert_eq!(parse_all(b"\x1b[A"), vec![csi(CsiCommand::CursorUp(1))]);
        assert_eq!(parse_all(b"\x1b[5B"), vec![csi(CsiCommand::CursorDown(5))]);
        assert_eq!(parse_all(b"\x1b[0C"), vec![csi(CsiCommand::CursorForward(1))]);
        assert_eq!(parse_all(b"\x1b[3G"), vec![csi(CsiCommand::ColumnAbsolute(3))]);
    }

    #[test]
    fn test_erase_sequences() {
        assert_eq!(
            parse_all(b"\x1b[J"),
            vec![csi(CsiCommand::EraseDisplay(EraseMode::ToEnd))]
        );
        assert_eq!(
            parse_all(b"\x1b[2K"),
            vec![csi(CsiCommand::EraseLine(EraseMode::All))]
        );
        assert_eq!(parse_all(b"\x1b[5J"), vec![Action::Nop]);
    }

    #[test]
    fn test_scroll_escapes() {
        assert_eq!(
            parse_all(b"\x1bM\x1bL"),
            vec![
                Action::Control(ControlAction::ScrollUp),
                Action::Control(ControlAction::ScrollDown),
            ]
        );
    }

    #[test]
    fn test_unknown_sequences_discarded() {
        // Unknown ESC final, unknown CSI final, second semicolon
        let actions = parse_all(b"\x1b7\x1b[1m\x1b[1;2;3H");
        assert_eq!(
            actions,
            vec![Action::Nop, Action::Nop, Action::Nop, Action::Print(b'3'), Action::Print(b'H')]
        );
    }

    #[test]
    fn test_param_digit_clamp() {
        let mut parser = Parser::new();
        // 1 -> 12 -> 123, then 123 >= 100 so '4' is ignored
        let actions = parser.feed(b"\x1b[1234;99999G");
        assert_eq!(actions, vec![csi(CsiCommand::ColumnAbsolute(123))]);

        let actions = parser.feed(b"\x1b[99;100H");
        assert_eq!(actions, vec![csi(CsiCommand::Position { line: 99, col: 100 })]);

        let actions = parser.feed(b"\x1b[100;1000H");
        assert_eq!(actions, vec![csi(CsiCommand::Position { line: 100, col: 100 })]);
    }

    #[test]
    fn test_truncated_sequence_stays_pending() {
        let mut source = ScriptedStream::new(b"\x1b[5");
        let mut parser = Parser::new();

        let first = source.try_read_byte().unwrap();
        assert!(parser.advance(first, &mut source).is_err());
        assert!(parser.is_awaiting_terminator());
        assert_eq!(parser.state().param1, 5);
        assert_eq!(source.consumed(), 3);

        // Resuming on a still-closed source consumes nothing
        assert!(parser.resume(&mut source).is_err());
        assert_eq!(source.consumed(), 3);

        // Later bytes finish the sequence instead of printing
        source.push(b"Az");
        assert_eq!(parser.resume(&mut source).unwrap(), csi(CsiCommand::CursorUp(5)));
        assert!(!parser.is_awaiting_terminator());
        assert_eq!(source.try_read_byte(), Some(b'z'));
    }

    #[test]
    fn test_feed_split_across_chunks() {
        let mut parser = Parser::new();
        assert_eq!(parser.feed(b"ab\x1b[1").len(), 2);
        assert!(parser.is_awaiting_terminator());
        assert_eq!(parser.feed(b"0D"), vec![csi(CsiCommand::CursorBack(10))]);
    }

    #[test]
    fn test_resume_without_pending_is_nop() {
        let mut source = ScriptedStream::new(b"x");
        let mut parser = Parser::new();
        assert_eq!(parser.resume(&mut source).unwrap(), Action::Nop);
        assert_eq!(source.consumed(), 0);
    }

    #[test]
    fn test_escape_inside_csi_discards() {
        // The ESC terminates the CSI as unrecognized and is consumed with it
        assert_eq!(parse_all(b"\x1b[3\x1bA"), vec![Action::Nop, Action::Print(b'A')]);
    }
}
