// src/lib.rs

//! matrix-os: a cooperative runtime kernel for pixel-matrix displays.
//!
//! The crate multiplexes one physical (or emulated) display and one input
//! stream across many cooperatively scheduled applications:
//!
//! - [`device`] holds the driver contracts, the priority-ordered device
//!   manager, and the shipped terminal/headless drivers.
//! - [`buffer`] is the compositing render surface with clip-region and
//!   transform stacks plus the rasterization primitives.
//! - [`notify`] queues "bring me to foreground" requests and paints the
//!   notification overlay.
//! - [`runtime`] is the fixed-rate scheduler that drives the foreground
//!   app, throttles backgrounded ones, and isolates app faults.

pub mod buffer;
pub mod color;
pub mod config;
pub mod device;
pub mod font;
pub mod keys;
pub mod notify;
pub mod runtime;
pub mod storage;

pub use buffer::PixelBuffer;
pub use color::Rgb;
pub use config::Config;
pub use device::{DeviceManager, DisplayDriver, InputDriver};
pub use keys::{InputEvent, InputEventKind, KeySymbol, Modifiers};
pub use notify::{NotificationManager, Priority};
pub use runtime::{App, AppFault, AppRuntime, OsContext, RuntimeStatus};
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
