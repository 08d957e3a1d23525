//! Cursor & Scroll Engine
//!
//! Turns parsed actions into pixel-space operations on a display surface.
//! The engine keeps no cursor of its own: it reads the surface cursor,
//! computes the new position and writes it back, because the surface moves
//! the cursor by itself whenever it draws a glyph.
//!
//! Scrolling is done with the surface's block transfer. The transfer runs
//! asynchronously on real controllers, so a fixed settling delay separates
//! it from the fill that clears the exposed row.

use std::time::Duration;

use tracing::{debug, trace};

use crate::core::{
    BlockTransfer, Color, CursorPosition, Direction, DisplaySurface, Rect, ScreenGeometry, BLACK,
};
use crate::parser::{Action, ControlAction, CsiCommand, EraseMode};

/// Wait between a scroll's block transfer and the following fill
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Line-ending translation applied to CR and LF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePolicy {
    /// LF also returns to column 0
    pub lf_to_crlf: bool,
    /// CR also advances one row
    pub cr_to_crlf: bool,
}

impl Default for LinePolicy {
    fn default() -> Self {
        Self {
            lf_to_crlf: true,
            cr_to_crlf: true,
        }
    }
}

/// Cursor and scroll operations over a borrowed surface
#[derive(Debug)]
pub struct Engine<'a, D: DisplaySurface + ?Sized> {
    surface: &'a mut D,
    geometry: ScreenGeometry,
    background: Color,
    settle: Duration,
}

impl<'a, D: DisplaySurface + ?Sized> Engine<'a, D> {
    pub fn new(surface: &'a mut D, geometry: ScreenGeometry) -> Self {
        Self {
            surface,
            geometry,
            background: BLACK,
            settle: SETTLE_DELAY,
        }
    }

    /// Override the scroll settling delay
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    pub fn cursor(&self) -> CursorPosition {
        self.surface.cursor()
    }

    /// Apply one parsed action
    pub fn apply(&mut self, action: Action, policy: LinePolicy) {
        match action {
            Action::Print(c) => self.print(c),
            Action::Control(control) => self.control(control, policy),
            Action::Nop => {}
        }
    }

    fn control(&mut self, control: ControlAction, policy: LinePolicy) {
        match control {
            ControlAction::CarriageReturn => self.carriage_return(policy.cr_to_crlf),
            ControlAction::LineFeed => self.line_feed(policy.lf_to_crlf),
            ControlAction::Backspace => self.backspace(),
            ControlAction::ScrollUp => self.scroll_up(),
            ControlAction::ScrollDown => self.scroll_down(),
            ControlAction::Csi(cmd) => self.csi(cmd),
        }
    }

    /// Execute a CSI command
    pub fn csi(&mut self, cmd: CsiCommand) {
        let pos = self.surface.cursor();
        let (x, y) = (i32::from(pos.x), i32::from(pos.y));
        let cw = i32::from(self.geometry.char_width);
        let ch = i32::from(self.geometry.char_height);

        match cmd {
            CsiCommand::CursorUp(n) => self.move_to(x, y - i32::from(n) * ch),
            CsiCommand::CursorDown(n) => self.move_to(x, y + i32::from(n) * ch),
            CsiCommand::CursorForward(n) => self.move_to(x + i32::from(n) * cw, y),
            CsiCommand::CursorBack(n) => self.move_to(x - i32::from(n) * cw, y),
            CsiCommand::NextLine(n) => self.move_to(0, y + i32::from(n) * ch),
            CsiCommand::PreviousLine(n) => self.move_to(0, y - i32::from(n) * ch),
            CsiCommand::ColumnAbsolute(n) => self.move_to((i32::from(n) - 1) * cw, y),
            CsiCommand::Position { line, col } => {
                let row = i32::from(line.saturating_sub(1));
                let column = i32::from(col.saturating_sub(1));
                self.move_to(column * cw, row * ch);
            }
            CsiCommand::EraseDisplay(mode) => self.erase_display(mode),
            CsiCommand::EraseLine(mode) => self.erase_line(mode),
            CsiCommand::ScrollUp(n) => {
                for _ in 0..n {
                    self.scroll_up();
                }
            }
            CsiCommand::ScrollDown(n) => {
                for _ in 0..n {
                    self.scroll_down();
                }
            }
        }
    }

    /// Move the cursor, clamped to the screen
    fn move_to(&mut self, x: i32, y: i32) {
        let pos = self.geometry.clamp(x, y);
        trace!("Cursor -> ({}, {})", pos.x, pos.y);
        self.surface.set_cursor(pos);
    }

    /// Return to column 0, optionally advancing a row
    ///
    /// Advancing never scrolls. Past the last row the cursor waits just
    /// below the screen, as after a wrap, and the next LF or glyph scrolls.
    pub fn carriage_return(&mut self, advance: bool) {
        let pos = self.surface.cursor();
        let below = u32::from(self.geometry.max_y()) + u32::from(self.geometry.char_height);
        let mut y = u32::from(pos.y);
        if advance {
            y += u32::from(self.geometry.char_height);
        }
        let y = y.min(below).min(u32::from(u16::MAX)) as u16;
        self.surface.set_cursor(CursorPosition::new(0, y));
    }

    /// Advance one row, optionally returning to column 0
    pub fn line_feed(&mut self, to_column_zero: bool) {
        let pos = self.surface.cursor();
        let y = self.next_row(pos.y);
        let x = if to_column_zero { 0 } else { pos.x.min(self.geometry.max_x()) };
        self.surface.set_cursor(CursorPosition::new(x, y));
    }

    /// Row below `y`, scrolling once if it would fall off the screen
    fn next_row(&mut self, y: u16) -> u16 {
        let next = u32::from(y) + u32::from(self.geometry.char_height);
        if next > u32::from(self.geometry.max_y()) {
            self.scroll_up();
            self.geometry.max_y()
        } else {
            next as u16
        }
    }

    /// Move left one column, stopping at 0
    pub fn backspace(&mut self) {
        let pos = self.surface.cursor();
        let x = i32::from(pos.x) - i32::from(self.geometry.char_width);
        self.move_to(x, i32::from(pos.y));
    }

    /// Draw a printable character
    ///
    /// If the surface's own advance left the cursor below the last row, the
    /// screen scrolls once first and the glyph goes on the last row.
    pub fn print(&mut self, c: u8) {
        let pos = self.surface.cursor();
        if self.geometry.is_below_last_row(pos) {
            self.scroll_up();
            self.surface
                .set_cursor(CursorPosition::new(pos.x, self.geometry.max_y()));
        }
        self.surface.draw_char(c);
    }

    /// Print text the way the surface's own println would
    ///
    /// `\n` starts a new line at column 0, `\r` returns to column 0.
    pub fn write_str(&mut self, text: &str) {
        for byte in text.bytes() {
            match byte {
                b'\n' => self.line_feed(true),
                b'\r' => self.carriage_return(false),
                0x20..=0x7E => self.print(byte),
                _ => {}
            }
        }
    }

    /// Scroll the screen contents up one row
    pub fn scroll_up(&mut self) {
        let ScreenGeometry {
            width,
            height,
            char_height,
            ..
        } = self.geometry;
        let moved = height.saturating_sub(char_height);
        debug!("Scroll up");
        if moved > 0 {
            self.surface.block_transfer(BlockTransfer {
                source: CursorPosition::new(0, char_height),
                dest: CursorPosition::HOME,
                width,
                height: moved,
                direction: Direction::Forward,
            });
            self.surface.pause(self.settle);
        }
        self.surface
            .fill_rect(Rect::new(0, moved, width, char_height), self.background);
    }

    /// Scroll the screen contents down one row
    pub fn scroll_down(&mut self) {
        let ScreenGeometry {
            width,
            height,
            char_height,
            ..
        } = self.geometry;
        let moved = height.saturating_sub(char_height);
        debug!("Scroll down");
        if moved > 0 && width > 0 {
            // Backward transfers are addressed by bottom-right corners
            self.surface.block_transfer(BlockTransfer {
                source: CursorPosition::new(width - 1, moved - 1),
                dest: CursorPosition::new(width - 1, height - 1),
                width,
                height: moved,
                direction: Direction::Backward,
            });
            self.surface.pause(self.settle);
        }
        self.surface
            .fill_rect(Rect::new(0, 0, width, char_height), self.background);
    }

    /// Fill the whole screen with the background and home the cursor
    pub fn clear_screen(&mut self) {
        let ScreenGeometry { width, height, .. } = self.geometry;
        self.surface
            .fill_rect(Rect::new(0, 0, width, height), self.background);
        self.surface.set_cursor(CursorPosition::HOME);
    }

    /// Erase part of the screen relative to the cursor
    pub fn erase_display(&mut self, mode: EraseMode) {
        let CursorPosition { x, y } = self.surface.cursor();
        let ScreenGeometry {
            width,
            height,
            char_width,
            char_height,
        } = self.geometry;

        match mode {
            EraseMode::ToEnd => {
                self.fill(Rect::new(x, y, width.saturating_sub(x), char_height));
                let below = y.saturating_add(char_height);
                if below < height {
                    self.fill(Rect::new(0, below, width, height - below));
                }
            }
            EraseMode::ToStart => {
                self.fill(Rect::new(0, 0, width, y));
                let through = x.saturating_add(char_width).min(width);
                self.fill(Rect::new(0, y, through, char_height));
            }
            EraseMode::All => self.clear_screen(),
        }
    }

    /// Erase part of the cursor's row
    pub fn erase_line(&mut self, mode: EraseMode) {
        let CursorPosition { x, y } = self.surface.cursor();
        let ScreenGeometry {
            width,
            char_width,
            char_height,
            ..
        } = self.geometry;

        let rect = match mode {
            EraseMode::ToEnd => Rect::new(x, y, width.saturating_sub(x), char_height),
            EraseMode::ToStart => {
                Rect::new(0, y, x.saturating_add(char_width).min(width), char_height)
            }
            EraseMode::All => Rect::new(0, y, width, char_height),
        };
        self.fill(rect);
    }

    fn fill(&mut self, rect: Rect) {
        if !rect.is_empty() {
            self.surface.fill_rect(rect, self.background);
        }
    }
}
