// src/device/drivers/terminal.rs

//! ANSI terminal display driver.
//!
//! Renders the matrix into a truecolor terminal using the upper-half-block
//! glyph: each character cell carries two vertically stacked pixels, the
//! top one as the SGR foreground and the bottom one as the SGR background.
//! A 256x192 matrix therefore needs a 256x96-cell terminal; when the
//! terminal is smaller, the reported matrix dimensions clamp to what fits.

use crate::color::Rgb;
use crate::device::driver::{DisplayDriver, PixelGrid};
use anyhow::{Context, Result};
use libc::{winsize, STDOUT_FILENO, TIOCGWINSZ};
use log::{info, warn};
use std::io::{stdout, Write};
use std::mem;
use std::os::unix::io::RawFd;

const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_SHOW: &str = "\x1b[?25h";
const CLEAR_SCREEN_AND_HOME: &str = "\x1b[2J\x1b[H";
const CURSOR_HOME: &str = "\x1b[H";
const SGR_RESET: &str = "\x1b[0m";
const HALF_BLOCK: char = '\u{2580}';

pub const TERMINAL_DISPLAY_PRIORITY: u8 = 50;

pub struct TerminalDisplayDriver {
    requested_width: u32,
    requested_height: u32,
    grid: PixelGrid,
    initialized: bool,
    frame: String,
}

impl TerminalDisplayDriver {
    /// `width`/`height` are the requested matrix dimensions; the driver
    /// clamps them to the terminal size during `initialize()`.
    pub fn new(width: u32, height: u32) -> Self {
        TerminalDisplayDriver {
            requested_width: width,
            requested_height: height,
            grid: PixelGrid::new(width, height),
            initialized: false,
            frame: String::new(),
        }
    }

    fn restore_terminal(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        print!("{}{}{}", SGR_RESET, CLEAR_SCREEN_AND_HOME, CURSOR_SHOW);
        if let Err(e) = stdout().flush() {
            warn!("TerminalDisplayDriver: failed to restore terminal: {}", e);
        }
    }
}

impl DisplayDriver for TerminalDisplayDriver {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn priority(&self) -> u8 {
        TERMINAL_DISPLAY_PRIORITY
    }

    fn is_available(&mut self) -> bool {
        let tty = unsafe { libc::isatty(STDOUT_FILENO) } == 1;
        let term_ok = std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false);
        tty && term_ok
    }

    fn initialize(&mut self) -> Result<()> {
        let (cols, rows) = terminal_size_cells(STDOUT_FILENO)
            .context("TerminalDisplayDriver: failed to get terminal size")?;
        // Two pixels per cell vertically; one row reserved so the frame
        // does not scroll the terminal.
        let width = self.requested_width.min(cols as u32);
        let height = self.requested_height.min((rows.saturating_sub(1) as u32) * 2);
        if width != self.requested_width || height != self.requested_height {
            warn!(
                "TerminalDisplayDriver: terminal {}x{} cells clamps matrix to {}x{}",
                cols, rows, width, height
            );
        }
        self.grid = PixelGrid::new(width, height);

        print!("{}{}", CURSOR_HIDE, CLEAR_SCREEN_AND_HOME);
        stdout()
            .flush()
            .context("TerminalDisplayDriver: failed to flush initial clear")?;
        self.initialized = true;
        info!("TerminalDisplayDriver: {}x{} matrix ready", width, height);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.restore_terminal();
        Ok(())
    }

    fn width(&self) -> u32 {
        self.grid.width()
    }

    fn height(&self) -> u32 {
        self.grid.height()
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        self.grid.set(x, y, color);
    }

    fn get_pixel(&self, x: i32, y: i32) -> Rgb {
        self.grid.get(x, y)
    }

    fn clear(&mut self) {
        self.grid.clear();
    }

    fn fill(&mut self, color: Rgb) {
        self.grid.fill(color);
    }

    /// Composes the whole frame into one escape-sequence string and writes
    /// it with a single flush. SGR state is only re-emitted when the pixel
    /// pair changes, which keeps the frame small on sparse screens.
    fn show(&mut self) -> Result<()> {
        self.frame.clear();
        self.frame.push_str(CURSOR_HOME);

        let mut last_pair: Option<(Rgb, Rgb)> = None;
        for y in (0..self.grid.height() as i32).step_by(2) {
            for x in 0..self.grid.width() as i32 {
                let top = self.grid.get(x, y);
                let bottom = self.grid.get(x, y + 1);
                if last_pair != Some((top, bottom)) {
                    self.frame.push_str(&format!(
                        "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m",
                        top.r, top.g, top.b, bottom.r, bottom.g, bottom.b
                    ));
                    last_pair = Some((top, bottom));
                }
                self.frame.push(HALF_BLOCK);
            }
            self.frame.push_str(SGR_RESET);
            self.frame.push_str("\r\n");
            last_pair = None;
        }

        let mut out = stdout();
        out.write_all(self.frame.as_bytes())
            .context("TerminalDisplayDriver: failed to write frame")?;
        out.flush()
            .context("TerminalDisplayDriver: failed to flush frame")
    }

    fn buffer(&self) -> &[Rgb] {
        self.grid.cells()
    }
}

impl Drop for TerminalDisplayDriver {
    fn drop(&mut self) {
        self.restore_terminal();
    }
}

fn terminal_size_cells(fd: RawFd) -> Result<(u16, u16)> {
    unsafe {
        let mut winsz: winsize = mem::zeroed();
        if libc::ioctl(fd, TIOCGWINSZ, &mut winsz) == -1 {
            return Err(anyhow::Error::from(std::io::Error::last_os_error())
                .context("ioctl(TIOCGWINSZ) failed"));
        }
        let cols = if winsz.ws_col == 0 { 80 } else { winsz.ws_col };
        let rows = if winsz.ws_row == 0 { 24 } else { winsz.ws_row };
        Ok((cols, rows))
    }
}
