//! Input Module
//!
//! Local input peripherals: an optional keyboard delivering decoded key
//! codes, and optional touch events. Producers push into a bounded queue
//! that the dispatcher drains once per iteration.
//!
//! # Key codes
//!
//! Printable and control keys arrive as their ASCII value. The keyboard
//! reports special keys above 0x80:
//! - 0x81..=0x84: up, down, left, right
//! - 0x85: setup
//! - 0x8A: clear screen

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default event queue depth
pub const EVENT_QUEUE_CAPACITY: usize = 16;

/// Maximum simultaneous touch points
pub const MAX_FINGERS: usize = 5;

const KEY_UP: u8 = 0x81;
const KEY_DOWN: u8 = 0x82;
const KEY_LEFT: u8 = 0x83;
const KEY_RIGHT: u8 = 0x84;
const KEY_SETUP: u8 = 0x85;
const KEY_CLEAR: u8 = 0x8A;
const KEY_DEL: u8 = 0x7F;

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Decode the keyboard's modifier byte (shift=0x01, ctrl=0x02, alt=0x04)
    pub fn from_bits(bits: u8) -> Self {
        Self {
            shift: bits & 0x01 != 0,
            ctrl: bits & 0x02 != 0,
            alt: bits & 0x04 != 0,
        }
    }

    /// Check if any modifier is pressed
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// A decoded key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    pub modifiers: Modifiers,
    pub code: u8,
}

impl KeyPress {
    pub fn new(code: u8) -> Self {
        Self {
            modifiers: Modifiers::default(),
            code,
        }
    }

    /// Decode a raw 16-bit key word: modifiers high, code low
    pub fn from_raw(raw: u16) -> Self {
        let [code, mods] = raw.to_le_bytes();
        Self {
            modifiers: Modifiers::from_bits(mods),
            code,
        }
    }

    /// What the terminal should do with this key
    pub fn classify(&self) -> LocalKey {
        match self.code {
            KEY_DEL if self.modifiers.ctrl && self.modifiers.alt => LocalKey::Reset,
            KEY_UP => LocalKey::Arrow(b'A'),
            KEY_DOWN => LocalKey::Arrow(b'B'),
            KEY_LEFT => LocalKey::Arrow(b'D'),
            KEY_RIGHT => LocalKey::Arrow(b'C'),
            KEY_CLEAR => LocalKey::ClearScreen,
            KEY_SETUP => LocalKey::Setup,
            code => LocalKey::Byte(code),
        }
    }
}

/// Meaning of a key press to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKey {
    /// Cursor key; carries the CSI final byte to send
    Arrow(u8),
    /// Clear the local screen
    ClearScreen,
    /// Enter the setup flow
    Setup,
    /// Ctrl+Alt+Del
    Reset,
    /// Send the byte to the host
    Byte(u8),
}

/// A source of decoded key presses
pub trait Keyboard {
    /// Return the next key press; with `wait`, block until one arrives
    fn poll_key(&mut self, wait: bool) -> Option<KeyPress>;
}

/// One touch point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: u32,
    pub y: u32,
    pub finger: u8,
}

/// A touch controller report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub fingers: u8,
    pub points: [TouchPoint; MAX_FINGERS],
}

/// Event from a local peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    Key(KeyPress),
    Touch(TouchEvent),
}

/// Bounded single-producer/single-consumer event queue
///
/// When full, pushing drops the oldest event so fresh input is never lost.
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    events: VecDeque<T>,
    capacity: usize,
    dropped: usize,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new(EVENT_QUEUE_CAPACITY)
    }
}

impl<T> EventQueue<T> {
    /// Create a queue holding at most `capacity` events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event, returning the evicted oldest one if full
    pub fn push(&mut self, event: T) -> Option<T> {
        let evicted = if self.events.len() == self.capacity {
            self.dropped += 1;
            warn!("Event queue full, dropping oldest event");
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    pub fn pop(&mut self) -> Option<T> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events dropped on overflow so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Remove and return all queued events, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.events.drain(..)
    }
}

/// A scripted keyboard for tests and demos
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeyboard {
    keys: VecDeque<KeyPress>,
}

impl ScriptedKeyboard {
    pub fn new(keys: impl IntoIterator<Item = KeyPress>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Keyboard that types the given bytes without modifiers
    pub fn typing(text: &[u8]) -> Self {
        Self::new(text.iter().map(|&c| KeyPress::new(c)))
    }

    pub fn push(&mut self, key: KeyPress) {
        self.keys.push_back(key);
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl Keyboard for ScriptedKeyboard {
    fn poll_key(&mut self, _wait: bool) -> Option<KeyPress> {
        // A script cannot block; an empty script behaves as no key
        self.keys.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_from_bits() {
        let mods = Modifiers::from_bits(0x06);
        assert!(mods.ctrl && mods.alt && !mods.shift);
        assert!(!Modifiers::from_bits(0).any());
    }

    #[test]
    fn test_key_from_raw() {
        let key = KeyPress::from_raw(0x0641);
        assert_eq!(key.code, 0x41);
        assert!(key.modifiers.ctrl);
        assert!(key.modifiers.alt);
    }

    #[test]
    fn test_classify() {
        assert_eq!(KeyPress::new(0x81).classify(), LocalKey::Arrow(b'A'));
        assert_eq!(KeyPress::new(0x82).classify(), LocalKey::Arrow(b'B'));
        assert_eq!(KeyPress::new(0x83).classify(), LocalKey::Arrow(b'D'));
        assert_eq!(KeyPress::new(0x84).classify(), LocalKey::Arrow(b'C'));
        assert_eq!(KeyPress::new(0x85).classify(), LocalKey::Setup);
        assert_eq!(KeyPress::new(0x8A).classify(), LocalKey::ClearScreen);
        assert_eq!(KeyPress::new(b'x').classify(), LocalKey::Byte(b'x'));
        // DEL alone is just a byte
        assert_eq!(KeyPress::new(0x7F).classify(), LocalKey::Byte(0x7F));
        assert_eq!(KeyPress::from_raw(0x067F).classify(), LocalKey::Reset);
    }

    #[test]
    fn test_queue_drops_oldest() {
        let mut queue = EventQueue::new(EVENT_QUEUE_CAPACITY);
        for i in 0..16u8 {
            assert_eq!(queue.push(i), None);
        }
        assert_eq!(queue.push(16), Some(0));
        assert_eq!(queue.push(17), Some(1));
        assert_eq!(queue.len(), 16);
        assert_eq!(queue.dropped(), 2);
        let drained: Vec<u8> = queue.drain().collect();
        assert_eq!(drained.first(), Some(&2));
        assert_eq!(drained.last(), Some(&17));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_zero_capacity_holds_one() {
        let mut queue = EventQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push('a');
        assert_eq!(queue.push('b'), Some('a'));
        assert_eq!(queue.pop(), Some('b'));
    }

    #[test]
    fn test_scripted_keyboard() {
        let mut kb = ScriptedKeyboard::typing(b"hi");
        assert_eq!(kb.poll_key(false), Some(KeyPress::new(b'h')));
        assert_eq!(kb.remaining(), 1);
        assert_eq!(kb.poll_key(true), Some(KeyPress::new(b'i')));
        assert_eq!(kb.poll_key(true), None);
    }
}
