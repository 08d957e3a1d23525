//! Terminal Dispatcher
//!
//! Ties together the serial link, the parser, the cursor engine and the
//! local peripherals. Each [`Terminal::poll`] drains whatever the host has
//! sent, then handles local input: key presses go out over the link (and
//! are echoed locally if configured), special keys act on the terminal
//! itself.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::app::{
    KeyboardOrStream, MemoryStore, SettingsStore, SetupFlow, SetupOutcome, TerminalSettings,
};
use crate::core::{CursorPosition, CursorStyle, DisplaySurface, Resolution, ScreenGeometry};
use crate::engine::{Engine, SETTLE_DELAY};
use crate::error::{Error, Result};
use crate::input::{EventQueue, InputEvent, KeyPress, Keyboard, LocalKey, EVENT_QUEUE_CAPACITY};
use crate::parser::{Action, ControlAction, CsiCommand, Parser};
use crate::serial::SerialLink;
use crate::touch::{load_touch_firmware, probe_flash, TouchHardware};

const ESC: u8 = 0x1B;
const BS: u8 = 0x08;

/// Mutable state shared by the dispatcher, engine and setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub settings: TerminalSettings,
    pub geometry: ScreenGeometry,
    /// Touch firmware loaded and controller running
    pub has_touch: bool,
}

impl Session {
    pub fn new(settings: TerminalSettings, geometry: ScreenGeometry) -> Self {
        Self {
            settings,
            geometry,
            has_touch: false,
        }
    }

    /// Re-read screen and font dimensions from the display
    pub fn recompute_geometry<D: DisplaySurface + ?Sized>(&mut self, display: &D) {
        self.geometry = ScreenGeometry::from_surface(display);
    }
}

/// A serial terminal driving one display
pub struct Terminal<S: SerialLink, D: DisplaySurface> {
    serial: S,
    display: D,
    parser: Parser,
    session: Session,
    store: Box<dyn SettingsStore>,
    keyboard: Option<Box<dyn Keyboard>>,
    touch: Option<TouchHardware>,
    events: EventQueue<InputEvent>,
    resolution: Resolution,
    settle: Duration,
}

impl<S: SerialLink, D: DisplaySurface> Terminal<S, D> {
    /// Create a terminal with default settings and an erased in-memory store
    pub fn new(serial: S, display: D) -> Self {
        let geometry = ScreenGeometry::from_surface(&display);
        Self {
            serial,
            display,
            parser: Parser::new(),
            session: Session::new(TerminalSettings::default(), geometry),
            store: Box::new(MemoryStore::new()),
            keyboard: None,
            touch: None,
            events: EventQueue::new(EVENT_QUEUE_CAPACITY),
            resolution: Resolution::default(),
            settle: SETTLE_DELAY,
        }
    }

    pub fn with_store(mut self, store: Box<dyn SettingsStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_keyboard(mut self, keyboard: Box<dyn Keyboard>) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_touch(mut self, touch: TouchHardware) -> Self {
        self.touch = Some(touch);
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventQueue::new(capacity);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn events(&self) -> &EventQueue<InputEvent> {
        &self.events
    }

    fn engine(&mut self) -> Engine<'_, D> {
        Engine::new(&mut self.display, self.session.geometry).with_settle_delay(self.settle)
    }

    fn say(&mut self, text: &str) {
        self.engine().write_str(text);
    }

    /// Bring the terminal up
    ///
    /// Loads settings, configures the link and display, prints the geometry
    /// banner, loads touch firmware if touch hardware is attached and
    /// finally clears the screen in the configured text color.
    pub fn boot(&mut self) -> Result<()> {
        self.session.settings = TerminalSettings::load(self.store.as_mut())?;
        let settings = self.session.settings;
        info!(?settings, "Booting terminal");

        self.serial.set_baud_rate(settings.baud_rate);
        self.display.set_mode(self.resolution);
        self.display.set_rotation(settings.rotation);
        self.display.set_font_scale(settings.font_size);
        self.session.recompute_geometry(&self.display);

        let g = self.session.geometry;
        let banner = format!(
            "Screen width: {}, height: {}\nFont width: {}, height: {}\nLine lengths: {} x {}\n",
            g.width,
            g.height,
            g.char_width,
            g.char_height,
            g.columns(),
            g.rows()
        );
        self.say(&banner);

        self.display.set_cursor_visible(CursorStyle::Underline, true);
        self.say("Starting up...\n");

        self.session.has_touch = self.bring_up_touch();

        self.display.set_text_color(settings.text_color);
        self.display.set_cursor(CursorPosition::HOME);
        self.engine().clear_screen();
        Ok(())
    }

    fn bring_up_touch(&mut self) -> bool {
        let Some(hw) = self.touch.as_mut() else {
            return false;
        };
        let mut console =
            Engine::new(&mut self.display, self.session.geometry).with_settle_delay(self.settle);

        match probe_flash(hw.flash.as_mut()) {
            Ok(capacity) => debug!(capacity, "Flash probe"),
            Err(e) => {
                warn!("Touch disabled: {}", e);
                console.write_str("Unable to setup Flash\n");
                return false;
            }
        }

        console.write_str("Loading Touch FIRMWARE...\n");
        if load_touch_firmware(hw.flash.as_mut(), hw.controller.as_mut()) {
            console.write_str("...Loaded Touch FIRMWARE\n");
            true
        } else {
            console.write_str("flash read failed\n");
            false
        }
    }

    /// Parse and apply one inbound byte
    ///
    /// An ESC pulls the rest of its sequence from the link before returning.
    pub fn process_byte(&mut self, byte: u8) -> Result<()> {
        let action = self.parser.advance(byte, &mut self.serial)?;
        self.apply(action);
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        trace!(?action, "Apply");
        let policy = self.session.settings.line_policy();
        self.engine().apply(action, policy);
    }

    /// Run one dispatcher iteration
    ///
    /// Returns how many inbound bytes and local events were handled.
    pub fn poll(&mut self) -> Result<usize> {
        let mut handled = 0;

        if self.parser.is_awaiting_terminator() {
            let action = self.parser.resume(&mut self.serial)?;
            self.apply(action);
            handled += 1;
        }

        while let Some(byte) = self.serial.try_read_byte() {
            self.process_byte(byte)?;
            handled += 1;
        }

        if let Some(key) = self.keyboard.as_mut().and_then(|kb| kb.poll_key(false)) {
            self.events.push(InputEvent::Key(key));
        }
        if self.session.has_touch {
            if let Some(touch) = self.touch.as_mut().and_then(|hw| hw.controller.poll_touch()) {
                self.events.push(InputEvent::Touch(touch));
            }
        }

        let events: Vec<InputEvent> = self.events.drain().collect();
        for event in events {
            handled += 1;
            match event {
                InputEvent::Key(key) => self.handle_key(key)?,
                InputEvent::Touch(touch) => {
                    debug!(fingers = touch.fingers, "Touch");
                }
            }
        }
        Ok(handled)
    }

    /// Queue an event from an external producer
    pub fn push_event(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Act on one local key press
    pub fn handle_key(&mut self, key: KeyPress) -> Result<()> {
        trace!(?key, "Key");
        match key.classify() {
            LocalKey::Reset => warn!("Reset requested; ignoring"),
            LocalKey::Arrow(final_byte) => {
                self.send(&[ESC, b'[', final_byte]);
                if self.session.settings.local_echo {
                    if let Some(cmd) = CsiCommand::from_parts(final_byte, 1, 0) {
                        self.engine().csi(cmd);
                    }
                }
            }
            LocalKey::ClearScreen => self.engine().clear_screen(),
            LocalKey::Setup => {
                self.run_setup()?;
            }
            LocalKey::Byte(byte) => {
                self.serial.write_byte(byte);
                if self.session.settings.local_echo {
                    self.echo(byte);
                }
            }
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.serial.write_byte(b);
        }
    }

    /// Show a sent byte locally
    fn echo(&mut self, byte: u8) {
        match byte {
            b'\r' => self.apply(Action::Control(ControlAction::CarriageReturn)),
            b'\n' => self.apply(Action::Control(ControlAction::LineFeed)),
            BS => self.apply(Action::Control(ControlAction::Backspace)),
            0x20..=0x7E => self.engine().print(byte),
            _ => {
                let shown = format!("\\x{:02X}", byte);
                self.say(&shown);
            }
        }
    }

    /// Run the interactive setup and adopt its outcome
    pub fn run_setup(&mut self) -> Result<SetupOutcome> {
        let mut answers = KeyboardOrStream::new(self.keyboard.as_deref_mut(), &mut self.serial);
        let outcome = SetupFlow::new(&mut self.display, self.session.settings)
            .with_settle_delay(self.settle)
            .run(&mut answers, self.store.as_mut())?;
        self.session.settings = outcome.settings;
        self.session.geometry = outcome.geometry;
        Ok(outcome)
    }

    /// Keep polling until the link closes and nothing is left to do
    ///
    /// A sequence cut off by the end of the link stays pending in the parser.
    pub fn run_until_closed(&mut self) -> Result<()> {
        loop {
            match self.poll() {
                Ok(0) if self.serial.is_closed() => return Ok(()),
                Ok(_) => {}
                Err(Error::StreamClosed) => {
                    debug!(state = ?self.parser.state(), "Link closed mid-sequence");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::settings::MemoryStore;
    use crate::core::{Framebuffer, GREEN};
    use crate::input::ScriptedKeyboard;
    use crate::serial::ScriptedStream;
    use crate::touch::{encode_firmware_image, EmulatedChip, RecordingController, TinyFlash};

    fn terminal(input: &[u8]) -> Terminal<ScriptedStream, Framebuffer> {
        Terminal::new(
            ScriptedStream::new(input),
            Framebuffer::with_font(Resolution::R320x240, (8, 16)),
        )
        .with_resolution(Resolution::R320x240)
        .with_settle_delay(Duration::ZERO)
    }

    #[test]
    fn test_boot_clears_and_configures() {
        let mut term = terminal(b"");
        term.boot().unwrap();

        assert_eq!(term.serial().baud_rate(), 9600);
        assert_eq!(term.session().geometry, ScreenGeometry::new(320, 240, 8, 16));
        assert_eq!(term.display().cursor(), CursorPosition::HOME);
        assert_eq!(term.display().text_color(), GREEN);
        assert_eq!(term.display().cursor_visible(), (CursorStyle::Underline, true));
        assert_eq!(term.display().row_text(0), "");
        assert!(!term.session().has_touch);
    }

    #[test]
    fn test_boot_uses_stored_settings() {
        let mut store = MemoryStore::new();
        TerminalSettings {
            baud_rate: 115200,
            font_size: 1,
            ..Default::default()
        }
        .save(&mut store)
        .unwrap();

        let mut term = terminal(b"").with_store(Box::new(store));
        term.boot().unwrap();
        assert_eq!(term.serial().baud_rate(), 115200);
        assert_eq!(term.session().geometry.char_width, 16);
    }

    #[test]
    fn test_poll_prints_host_output() {
        let mut term = terminal(b"hi\nthere");
        term.boot().unwrap();
        term.run_until_closed().unwrap();

        assert_eq!(term.display().row_text(0), "hi");
        assert_eq!(term.display().row_text(1), "there");
    }

    #[test]
    fn test_truncated_sequence_stays_pending() {
        let mut term = terminal(b"ab\x1b[5");
        term.boot().unwrap();
        term.run_until_closed().unwrap();

        assert!(term.parser().is_awaiting_terminator());
        assert_eq!(term.parser().state().param1, 5);
        assert_eq!(term.display().row_text(0), "ab");

        term.serial_mut().push(b"Cx");
        term.run_until_closed().unwrap();
        assert_eq!(term.display().glyph_at(7, 0), Some(b'x'));
    }

    #[test]
    fn test_arrow_key_sends_sequence_and_echoes() {
        let keyboard = ScriptedKeyboard::new([KeyPress::new(0x82), KeyPress::new(0x84)]);
        let mut term = terminal(b"").with_keyboard(Box::new(keyboard));
        term.boot().unwrap();
        term.poll().unwrap();
        term.poll().unwrap();

        assert_eq!(term.serial().sent(), b"\x1b[B\x1b[C");
        assert_eq!(term.display().cursor(), CursorPosition::new(8, 16));
    }

    #[test]
    fn test_key_echo_formats_control_bytes() {
        let mut term = terminal(b"");
        term.boot().unwrap();
        term.handle_key(KeyPress::new(b'a')).unwrap();
        term.handle_key(KeyPress::new(0x01)).unwrap();

        assert_eq!(term.serial().sent(), &[b'a', 0x01]);
        assert_eq!(term.display().row_text(0), "a\\x01");
    }

    #[test]
    fn test_no_echo_when_disabled() {
        let mut store = MemoryStore::new();
        TerminalSettings {
            local_echo: false,
            ..Default::default()
        }
        .save(&mut store)
        .unwrap();
        let mut term = terminal(b"").with_store(Box::new(store));
        term.boot().unwrap();
        term.handle_key(KeyPress::new(b'a')).unwrap();
        term.handle_key(KeyPress::new(0x81)).unwrap();

        assert_eq!(term.serial().sent(), b"a\x1b[A");
        assert_eq!(term.display().row_text(0), "");
        assert_eq!(term.display().cursor(), CursorPosition::HOME);
    }

    #[test]
    fn test_clear_key_and_reset_key() {
        let mut term = terminal(b"text");
        term.boot().unwrap();
        term.run_until_closed().unwrap();
        term.handle_key(KeyPress::from_raw(0x067F)).unwrap();
        assert_eq!(term.display().row_text(0), "text");
        assert!(term.serial().sent().is_empty());

        term.handle_key(KeyPress::new(0x8A)).unwrap();
        assert_eq!(term.display().row_text(0), "");
        assert_eq!(term.display().cursor(), CursorPosition::HOME);
    }

    #[test]
    fn test_setup_key_updates_session() {
        let mut keyboard = ScriptedKeyboard::new([KeyPress::new(0x85)]);
        for &c in b"1 0y" {
            keyboard.push(KeyPress::new(c));
        }
        let mut term = terminal(b"").with_keyboard(Box::new(keyboard));
        term.boot().unwrap();
        term.poll().unwrap();

        let session = term.session();
        assert_eq!(session.settings.font_size, 1);
        assert!(!session.settings.local_echo);
        assert_eq!(session.geometry, ScreenGeometry::new(320, 240, 16, 32));
    }

    #[test]
    fn test_touch_bring_up() {
        let records = vec![(0x10, [1, 2, 3, 4]); crate::touch::FW_RECORD_COUNT];
        let flash = TinyFlash::new(EmulatedChip::new(encode_firmware_image(&records)));
        let hw = TouchHardware::new(Box::new(flash), Box::new(RecordingController::default()));
        let mut term = terminal(b"").with_touch(hw);
        term.boot().unwrap();
        assert!(term.session().has_touch);
    }

    #[test]
    fn test_touch_missing_flash() {
        let flash = TinyFlash::new(EmulatedChip::new(vec![]).with_id(0, 0));
        let hw = TouchHardware::new(Box::new(flash), Box::new(RecordingController::default()));
        let mut term = terminal(b"").with_touch(hw);
        term.boot().unwrap();
        assert!(!term.session().has_touch);
    }

    #[test]
    fn test_event_queue_overflow_drops_oldest() {
        let mut term = terminal(b"");
        term.boot().unwrap();
        for c in b'a'..=b'r' {
            term.push_event(InputEvent::Key(KeyPress::new(c)));
        }
        assert_eq!(term.events().len(), 16);
        assert_eq!(term.events().dropped(), 2);
        term.poll().unwrap();
        assert_eq!(term.serial().sent(), b"cdefghijklmnopqr");
    }
}
