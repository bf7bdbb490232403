// src/device/drivers/keyboard.rs

//! Raw-mode terminal keyboard input driver.
//!
//! Puts stdin into raw mode with VMIN=0/VTIME=0 so `poll()` never blocks,
//! decodes CSI arrow sequences and a handful of control bytes into
//! [`InputEvent`]s, and fires them into the registered sink in production
//! order. The original termios settings are restored on shutdown and on
//! Drop.

use crate::device::driver::{EventSink, InputDriver};
use crate::keys::{InputEvent, KeySymbol, Modifiers};
use anyhow::{Context, Result};
use libc::STDIN_FILENO;
use log::{debug, trace, warn};
use std::io::{self, Read};
use termios::{tcsetattr, Termios, ECHO, ICANON, ISIG, TCSANOW, VMIN, VTIME};

pub const TERMINAL_INPUT_PRIORITY: u8 = 50;

const DRIVER_NAME: &str = "terminal-keyboard";

pub struct TerminalInputDriver {
    original_termios: Option<Termios>,
    sink: Option<EventSink>,
    read_buffer: [u8; 128],
}

impl TerminalInputDriver {
    pub fn new() -> Self {
        TerminalInputDriver {
            original_termios: None,
            sink: None,
            read_buffer: [0u8; 128],
        }
    }

    fn restore_terminal(&mut self) {
        if let Some(original) = self.original_termios.take() {
            debug!("TerminalInputDriver: restoring original terminal attributes");
            if let Err(e) = tcsetattr(STDIN_FILENO, TCSANOW, &original) {
                warn!(
                    "TerminalInputDriver: failed to restore terminal attributes: {}",
                    e
                );
            }
        }
    }

    fn emit(&mut self, symbol: KeySymbol, modifiers: Modifiers) {
        if let Some(sink) = self.sink.as_mut() {
            sink(InputEvent::key_down(symbol, modifiers, DRIVER_NAME));
        }
    }

    /// Decodes one chunk of raw bytes into key events, in order.
    fn decode(&mut self, bytes_read: usize) {
        let chunk = self.read_buffer[..bytes_read].to_vec();
        let mut i = 0;
        while i < chunk.len() {
            let byte = chunk[i];
            match byte {
                0x1b => {
                    // CSI arrow sequence, or a lone ESC press.
                    if i + 2 < chunk.len() && chunk[i + 1] == b'[' {
                        let symbol = match chunk[i + 2] {
                            b'A' => Some(KeySymbol::Up),
                            b'B' => Some(KeySymbol::Down),
                            b'C' => Some(KeySymbol::Right),
                            b'D' => Some(KeySymbol::Left),
                            b'3' => Some(KeySymbol::Delete),
                            other => {
                                trace!(
                                    "TerminalInputDriver: ignoring CSI final byte 0x{:02x}",
                                    other
                                );
                                None
                            }
                        };
                        if let Some(symbol) = symbol {
                            self.emit(symbol, Modifiers::empty());
                        }
                        // Delete arrives as ESC [ 3 ~; skip the tilde too.
                        i += if chunk[i + 2] == b'3' { 4 } else { 3 };
                        continue;
                    }
                    self.emit(KeySymbol::Escape, Modifiers::empty());
                    i += 1;
                }
                b'\r' | b'\n' => {
                    self.emit(KeySymbol::Enter, Modifiers::empty());
                    i += 1;
                }
                0x7f | 0x08 => {
                    self.emit(KeySymbol::Backspace, Modifiers::empty());
                    i += 1;
                }
                b'\t' => {
                    self.emit(KeySymbol::Tab, Modifiers::empty());
                    i += 1;
                }
                0x01..=0x1a => {
                    // Control-chord: Ctrl+A .. Ctrl+Z.
                    let c = (byte - 0x01 + b'a') as char;
                    self.emit(KeySymbol::Char(c), Modifiers::CONTROL);
                    i += 1;
                }
                0x20..=0x7e => {
                    self.emit(KeySymbol::Char(byte as char), Modifiers::empty());
                    i += 1;
                }
                other => {
                    trace!("TerminalInputDriver: ignoring byte 0x{:02x}", other);
                    i += 1;
                }
            }
        }
    }
}

impl Default for TerminalInputDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDriver for TerminalInputDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn priority(&self) -> u8 {
        TERMINAL_INPUT_PRIORITY
    }

    fn is_available(&mut self) -> bool {
        unsafe { libc::isatty(STDIN_FILENO) == 1 }
    }

    fn initialize(&mut self) -> Result<()> {
        let original = Termios::from_fd(STDIN_FILENO)
            .context("TerminalInputDriver: failed to get terminal attributes")?;

        let mut raw = original;
        raw.c_lflag &= !(ECHO | ICANON | ISIG);
        raw.c_iflag &= !(libc::IXON | libc::IXOFF | libc::ICRNL | libc::INLCR | libc::IGNCR);
        raw.c_cc[VMIN] = 0;
        raw.c_cc[VTIME] = 0;
        tcsetattr(STDIN_FILENO, TCSANOW, &raw)
            .context("TerminalInputDriver: failed to set raw terminal attributes")?;

        self.original_termios = Some(original);
        debug!("TerminalInputDriver: terminal set to raw mode");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.restore_terminal();
        Ok(())
    }

    fn on_event(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn poll(&mut self) -> Result<()> {
        match io::stdin().read(&mut self.read_buffer) {
            // With VMIN=0/VTIME=0 a zero-byte read means no pending input.
            Ok(0) => Ok(()),
            Ok(bytes_read) => {
                trace!("TerminalInputDriver: read {} bytes", bytes_read);
                self.decode(bytes_read);
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(e).context("TerminalInputDriver: error reading from stdin"),
        }
    }
}

impl Drop for TerminalInputDriver {
    fn drop(&mut self) {
        self.restore_terminal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn decode_bytes(bytes: &[u8]) -> Vec<(KeySymbol, Modifiers)> {
        let seen: Rc<RefCell<Vec<(KeySymbol, Modifiers)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let mut driver = TerminalInputDriver::new();
        driver.on_event(Box::new(move |ev| {
            sink_seen.borrow_mut().push((ev.symbol, ev.modifiers))
        }));
        driver.read_buffer[..bytes.len()].copy_from_slice(bytes);
        driver.decode(bytes.len());
        let result = seen.borrow().clone();
        result
    }

    #[test]
    fn decodes_arrow_sequences() {
        assert_eq!(
            decode_bytes(b"\x1b[A\x1b[B\x1b[C\x1b[D"),
            vec![
                (KeySymbol::Up, Modifiers::empty()),
                (KeySymbol::Down, Modifiers::empty()),
                (KeySymbol::Right, Modifiers::empty()),
                (KeySymbol::Left, Modifiers::empty()),
            ]
        );
    }

    #[test]
    fn lone_escape_is_escape_key() {
        assert_eq!(
            decode_bytes(b"\x1b"),
            vec![(KeySymbol::Escape, Modifiers::empty())]
        );
    }

    #[test]
    fn printable_and_control_bytes_decode_in_order() {
        assert_eq!(
            decode_bytes(b"a\r\x03"),
            vec![
                (KeySymbol::Char('a'), Modifiers::empty()),
                (KeySymbol::Enter, Modifiers::empty()),
                (KeySymbol::Char('c'), Modifiers::CONTROL),
            ]
        );
    }

    #[test]
    fn delete_sequence_consumes_tilde() {
        assert_eq!(
            decode_bytes(b"\x1b[3~x"),
            vec![
                (KeySymbol::Delete, Modifiers::empty()),
                (KeySymbol::Char('x'), Modifiers::empty()),
            ]
        );
    }
}
