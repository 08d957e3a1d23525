//! Terminal Actions
//!
//! Semantic operations produced by the parser that should be applied to the
//! display. Each ordinary byte, and each complete escape sequence, yields
//! exactly one action.

use serde::{Deserialize, Serialize};

/// A terminal action produced by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Draw a printable character (0x20..=0x7E) at the cursor
    Print(u8),

    /// Move the cursor, erase, or scroll
    Control(ControlAction),

    /// Nothing to do: dropped byte or discarded sequence
    Nop,
}

impl Action {
    /// Check if this is a print action
    pub fn is_print(&self) -> bool {
        matches!(self, Action::Print(_))
    }

    /// Check if this is a control action
    pub fn is_control(&self) -> bool {
        matches!(self, Action::Control(_))
    }

    /// Check if this is a no-op
    pub fn is_nop(&self) -> bool {
        matches!(self, Action::Nop)
    }
}

/// Control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    /// CR - return to line start (plus a line advance under CR→CRLF)
    CarriageReturn,
    /// LF - advance one row (plus return to column 0 under LF→CRLF)
    LineFeed,
    /// BS - move left one column
    Backspace,
    /// ESC M - scroll the screen up one line
    ScrollUp,
    /// ESC L - scroll the screen down one line
    ScrollDown,
    /// A recognized CSI sequence
    Csi(CsiCommand),
}

/// Region selector for erase commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseMode {
    /// Cursor to end (parameter 0)
    ToEnd,
    /// Start to cursor (parameter 1)
    ToStart,
    /// Everything (parameter 2)
    All,
}

impl EraseMode {
    /// Map an erase parameter; other values are not recognized
    pub fn from_param(param: u16) -> Option<Self> {
        match param {
            0 => Some(EraseMode::ToEnd),
            1 => Some(EraseMode::ToStart),
            2 => Some(EraseMode::All),
            _ => None,
        }
    }
}

/// CSI (Control Sequence Introducer) commands
///
/// Counts have their defaults applied already; positions are the raw
/// 1-based values from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsiCommand {
    /// CSI n A
    CursorUp(u16),
    /// CSI n B
    CursorDown(u16),
    /// CSI n C
    CursorForward(u16),
    /// CSI n D
    CursorBack(u16),
    /// CSI n E - column 0, n rows down
    NextLine(u16),
    /// CSI n F - column 0, n rows up
    PreviousLine(u16),
    /// CSI n G - 1-based column
    ColumnAbsolute(u16),
    /// CSI line ; col H (or f)
    Position { line: u16, col: u16 },
    /// CSI n J
    EraseDisplay(EraseMode),
    /// CSI n K
    EraseLine(EraseMode),
    /// CSI n S
    ScrollUp(u16),
    /// CSI n T
    ScrollDown(u16),
}

impl CsiCommand {
    /// Build a command from the terminator and the two parameters
    ///
    /// Returns `None` for terminators or erase modes that are not recognized.
    pub fn from_parts(final_byte: u8, param1: u16, param2: u16) -> Option<Self> {
        let n = param1.max(1);
        let cmd = match final_byte {
            b'A' => CsiCommand::CursorUp(n),
            b'B' => CsiCommand::CursorDown(n),
            b'C' => CsiCommand::CursorForward(n),
            b'D' => CsiCommand::CursorBack(n),
            b'E' => CsiCommand::NextLine(n),
            b'F' => CsiCommand::PreviousLine(n),
            b'G' => CsiCommand::ColumnAbsolute(n),
            b'H' | b'f' => CsiCommand::Position {
                line: param1,
                col: param2,
            },
            b'J' => CsiCommand::EraseDisplay(EraseMode::from_param(param1)?),
            b'K' => CsiCommand::EraseLine(EraseMode::from_param(param1)?),
            b'S' => CsiCommand::ScrollUp(n),
            b'T' => CsiCommand::ScrollDown(n),
            _ => return None,
        };
        Some(cmd)
    }
}
