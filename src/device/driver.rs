// src/device/driver.rs

//! Driver contracts for display and input devices.
//!
//! Both traits are pure capability interfaces: the runtime never branches
//! on a concrete driver type, and all common logic lives in
//! [`DeviceManager`](crate::device::DeviceManager) and the runtime itself.
//!
//! ## Lifecycle
//! 1. A constructor closure is registered with the device manager.
//! 2. During manager initialization every candidate is constructed and
//!    probed with `is_available()` (probing may block on device I/O; it
//!    happens only at startup, never inside the frame loop).
//! 3. `initialize()` is called on the selected candidate only.
//! 4. `shutdown()` releases resources; drivers should also restore state
//!    from `Drop` so a crash cannot leave the device wedged.

use crate::color::Rgb;
use crate::keys::InputEvent;
use anyhow::Result;

/// The single sink an input driver delivers events into.
pub type EventSink = Box<dyn FnMut(InputEvent)>;

/// Capability interface for display drivers.
///
/// `show()` is the only method permitted to have an externally visible
/// side effect per frame; everything else mutates driver-local state.
pub trait DisplayDriver {
    fn name(&self) -> &'static str;

    /// Priority for auto-selection; higher wins when several candidates
    /// are available.
    fn priority(&self) -> u8;

    /// Whether this driver can run here. May probe a device file, a
    /// terminal, or a network port.
    fn is_available(&mut self) -> bool;

    fn initialize(&mut self) -> Result<()>;

    fn shutdown(&mut self) -> Result<()>;

    /// Width in pixels, fixed after `initialize()`.
    fn width(&self) -> u32;

    /// Height in pixels, fixed after `initialize()`.
    fn height(&self) -> u32;

    /// Writes one pixel. Out-of-range writes are silently dropped.
    fn set_pixel(&mut self, x: i32, y: i32, color: Rgb);

    /// Reads one pixel. Out-of-range reads return black.
    fn get_pixel(&self, x: i32, y: i32) -> Rgb;

    fn clear(&mut self);

    fn fill(&mut self, color: Rgb);

    /// Flushes the driver's buffer to the physical or virtual surface.
    fn show(&mut self) -> Result<()>;

    /// Read access to the driver's backing cells, row-major.
    fn buffer(&self) -> &[Rgb];
}

/// Capability interface for input drivers.
pub trait InputDriver {
    fn name(&self) -> &'static str;

    fn priority(&self) -> u8;

    fn is_available(&mut self) -> bool;

    fn initialize(&mut self) -> Result<()>;

    fn shutdown(&mut self) -> Result<()>;

    /// Registers the single event sink. At most one sink is retained;
    /// re-registration replaces the previous one. The driver invokes the
    /// sink once per event, in the order the events were produced.
    fn on_event(&mut self, sink: EventSink);

    /// Reads the underlying device and delivers any pending events into
    /// the registered sink. Called once per frame by the runtime.
    fn poll(&mut self) -> Result<()>;
}

/// Bounds-checked default pixel storage for display drivers.
///
/// Concrete drivers embed a grid and delegate the pixel methods to it, so
/// the silent-drop contract is implemented once.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    cells: Vec<Rgb>,
}

impl PixelGrid {
    pub fn new(width: u32, height: u32) -> Self {
        PixelGrid {
            width,
            height,
            cells: vec![Rgb::BLACK; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        self.cells[(y as usize) * (self.width as usize) + x as usize] = color;
    }

    pub fn get(&self, x: i32, y: i32) -> Rgb {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return Rgb::BLACK;
        }
        self.cells[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn fill(&mut self, color: Rgb) {
        self.cells.fill(color);
    }

    pub fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    pub fn cells(&self) -> &[Rgb] {
        &self.cells
    }
}
