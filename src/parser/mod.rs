//! Terminal escape sequence parser
//!
//! A stateful parser that converts serial bytes into terminal actions.
//! Only the small VT100/ANSI subset the device understands is recognized;
//! everything else is dropped without error.

mod action;
mod state;

pub use action::{Action, ControlAction, CsiCommand, EraseMode};
pub use state::{EscapeSequenceState, Mode, Parser};
