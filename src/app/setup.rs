//! Interactive setup
//!
//! A short, linear dialogue drawn on the terminal's own screen: font size,
//! rotation, local echo, then save / discard / restore. Every prompt takes
//! one key. `q` at any prompt abandons the whole session; any key that is
//! not a valid answer leaves that setting alone and moves on.
//!
//! Font and rotation answers are previewed immediately, but nothing becomes
//! live until the last prompt is answered. Abandoning puts the display back
//! the way the live settings describe it.

use std::time::Duration;

use tracing::{debug, info};

use super::settings::{SettingsStore, TerminalSettings};
use crate::core::{DisplaySurface, ScreenGeometry};
use crate::engine::{Engine, SETTLE_DELAY};
use crate::error::{Error, Result};
use crate::input::Keyboard;
use crate::serial::ByteSource;

const BANNER: &str = "Enter the values to change,\r\nspace skips to next,\r\nq quits\n";
const QUIT: u8 = b'q';

/// Where setup answers come from
pub trait AnswerSource {
    /// Block until the next answer key
    fn next_answer(&mut self) -> Result<u8>;
}

/// Answers from the keyboard when it has a key, otherwise the serial link
pub struct KeyboardOrStream<'a, S: ByteSource + ?Sized> {
    keyboard: Option<&'a mut (dyn Keyboard + 'static)>,
    stream: &'a mut S,
}

impl<'a, S: ByteSource + ?Sized> KeyboardOrStream<'a, S> {
    pub fn new(keyboard: Option<&'a mut (dyn Keyboard + 'static)>, stream: &'a mut S) -> Self {
        Self { keyboard, stream }
    }
}

impl<S: ByteSource + ?Sized> AnswerSource for KeyboardOrStream<'_, S> {
    fn next_answer(&mut self) -> Result<u8> {
        loop {
            if let Some(key) = self.keyboard.as_mut().and_then(|kb| kb.poll_key(false)) {
                return Ok(key.code);
            }
            if let Some(byte) = self.stream.try_read_byte() {
                return Ok(byte);
            }
            if self.stream.is_closed() {
                return Err(Error::StreamClosed);
            }
            std::hint::spin_loop();
        }
    }
}

/// How a setup session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupResult {
    /// Changes applied and written to the store
    Saved,
    /// Changes applied and the stored settings invalidated
    Restored,
    /// Changes applied for this session only
    Applied,
    /// Nothing changed
    Aborted,
}

/// Result of a setup session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOutcome {
    /// Settings to use from now on
    pub settings: TerminalSettings,
    /// Geometry matching the display state after setup
    pub geometry: ScreenGeometry,
    pub result: SetupResult,
}

/// One run of the setup dialogue
pub struct SetupFlow<'a, D: DisplaySurface + ?Sized> {
    surface: &'a mut D,
    geometry: ScreenGeometry,
    settle: Duration,
    staged: TerminalSettings,
    live: TerminalSettings,
}

impl<'a, D: DisplaySurface + ?Sized> SetupFlow<'a, D> {
    pub fn new(surface: &'a mut D, live: TerminalSettings) -> Self {
        let geometry = ScreenGeometry::from_surface(&*surface);
        Self {
            surface,
            geometry,
            settle: SETTLE_DELAY,
            staged: live,
            live,
        }
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn engine(&mut self) -> Engine<'_, D> {
        Engine::new(&mut *self.surface, self.geometry).with_settle_delay(self.settle)
    }

    fn say(&mut self, text: &str) {
        self.engine().write_str(text);
    }

    fn clear(&mut self) {
        self.engine().clear_screen();
    }

    /// Re-read geometry after a font or rotation change and clear
    fn refresh_geometry(&mut self) {
        self.geometry = ScreenGeometry::from_surface(&*self.surface);
        self.clear();
    }

    /// Run the dialogue to completion
    ///
    /// A closed answer source counts as `q`. Store failures are returned
    /// after the display has been left in its previewed state.
    pub fn run<A: AnswerSource + ?Sized>(
        mut self,
        answers: &mut A,
        store: &mut dyn SettingsStore,
    ) -> Result<SetupOutcome> {
        info!("Entering setup");
        self.clear();

        match self.dialogue(answers, store) {
            Ok(Some(result)) => {
                self.say("\r\nDone\n");
                info!(?result, "Setup finished");
                Ok(SetupOutcome {
                    settings: self.staged,
                    geometry: self.geometry,
                    result,
                })
            }
            Ok(None) | Err(Error::StreamClosed) => {
                self.abandon();
                self.say("\r\nDone\n");
                info!("Setup abandoned");
                Ok(SetupOutcome {
                    settings: self.live,
                    geometry: self.geometry,
                    result: SetupResult::Aborted,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Walk the prompts; `None` means the user quit
    fn dialogue<A: AnswerSource + ?Sized>(
        &mut self,
        answers: &mut A,
        store: &mut dyn SettingsStore,
    ) -> Result<Option<SetupResult>> {
        self.say(BANNER);

        self.say("font size (0,1,2,3) > ");
        match answers.next_answer()? {
            QUIT => return Ok(None),
            k @ b'0'..=b'3' => {
                self.staged.font_size = k - b'0';
                self.surface.set_font_scale(self.staged.font_size);
                self.refresh_geometry();
            }
            k => debug!(key = k, "Font size skipped"),
        }
        self.say("\n");

        self.say("rotation (0,1) > ");
        match answers.next_answer()? {
            QUIT => return Ok(None),
            k @ b'0'..=b'1' => {
                self.staged.rotation = k - b'0';
                self.surface.set_rotation(self.staged.rotation);
                self.refresh_geometry();
            }
            k => debug!(key = k, "Rotation skipped"),
        }
        self.say("\n");

        self.say("local Echo (0,1) > ");
        match answers.next_answer()? {
            QUIT => return Ok(None),
            k @ b'0'..=b'1' => self.staged.local_echo = k == b'1',
            k => debug!(key = k, "Local echo skipped"),
        }
        self.say("\n");

        self.say("Save (y/n/r) > ");
        let result = match answers.next_answer()? {
            QUIT => return Ok(None),
            b'r' => {
                TerminalSettings::restore_defaults(store)?;
                self.say("\r\nSettings restored\n");
                SetupResult::Restored
            }
            b'y' => {
                self.staged.save(store)?;
                self.say("\r\nSettings saved\n");
                SetupResult::Saved
            }
            _ => SetupResult::Applied,
        };
        Ok(Some(result))
    }

    /// Undo any previewed display change
    fn abandon(&mut self) {
        let changed = self.staged.font_size != self.live.font_size
            || self.staged.rotation != self.live.rotation;
        self.staged = self.live;
        if changed {
            self.surface.set_rotation(self.live.rotation);
            self.surface.set_font_scale(self.live.font_size);
            self.refresh_geometry();
        }
    }
}
