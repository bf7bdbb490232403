// src/keys.rs

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

bitflags! {
    /// Represents a keyboard modifier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

/// Represents a key symbol.
///
/// This enum defines the keypresses the runtime and apps route: directional
/// navigation, confirm/cancel, a few editing keys, and raw characters. The
/// concrete mapping from physical input (scancodes, escape sequences,
/// gamepad buttons) is a driver responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KeySymbol {
    Char(char),

    // Navigation keys
    Left,
    Right,
    Up,
    Down,

    // Confirm / cancel
    Enter,
    Escape,

    // Editing keys
    Backspace,
    Delete,
    Tab,

    // Unidentified key
    #[default]
    Unknown,
}

/// The kind of input event a driver produced.
///
/// Only key-down events exist today; drivers that can observe releases
/// collapse them (the shell's navigation model is press-driven).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEventKind {
    KeyDown,
}

/// A single input event, as produced by the active input driver and
/// consumed by the runtime and apps.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub symbol: KeySymbol,
    pub modifiers: Modifiers,
    pub kind: InputEventKind,
    /// Milliseconds since the Unix epoch at the time the driver decoded
    /// the event.
    pub timestamp_ms: u64,
    /// Name of the driver that produced the event.
    pub source: String,
}

impl InputEvent {
    /// Builds a key-down event stamped with the current wall-clock time.
    pub fn key_down(symbol: KeySymbol, modifiers: Modifiers, source: &str) -> Self {
        InputEvent {
            symbol,
            modifiers,
            kind: InputEventKind::KeyDown,
            timestamp_ms: now_ms(),
            source: source.to_string(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_down_records_symbol_and_source() {
        let ev = InputEvent::key_down(KeySymbol::Enter, Modifiers::empty(), "test-keyboard");
        assert_eq!(ev.symbol, KeySymbol::Enter);
        assert_eq!(ev.kind, InputEventKind::KeyDown);
        assert_eq!(ev.source, "test-keyboard");
    }
}
