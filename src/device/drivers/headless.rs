// src/device/drivers/headless.rs

//! Headless display and input drivers.
//!
//! Both are always available at the lowest priority: the last-resort
//! fallback that keeps the runtime operational in CI or on a box with no
//! usable terminal. The display keeps a full pixel grid so rendered frames
//! stay inspectable; `show()` is a no-op.

use crate::color::Rgb;
use crate::device::driver::{DisplayDriver, EventSink, InputDriver, PixelGrid};
use crate::keys::InputEvent;
use anyhow::Result;
use log::{info, trace};
use std::collections::VecDeque;

pub const HEADLESS_PRIORITY: u8 = 10;

pub struct HeadlessDisplayDriver {
    grid: PixelGrid,
}

impl HeadlessDisplayDriver {
    pub fn new(width: u32, height: u32) -> Self {
        HeadlessDisplayDriver {
            grid: PixelGrid::new(width, height),
        }
    }
}

impl DisplayDriver for HeadlessDisplayDriver {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn priority(&self) -> u8 {
        HEADLESS_PRIORITY
    }

    fn is_available(&mut self) -> bool {
        true
    }

    fn initialize(&mut self) -> Result<()> {
        info!(
            "HeadlessDisplayDriver: {}x{} surface ready",
            self.grid.width(),
            self.grid.height()
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
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

    fn show(&mut self) -> Result<()> {
        trace!("HeadlessDisplayDriver: show (no-op)");
        Ok(())
    }

    fn buffer(&self) -> &[Rgb] {
        self.grid.cells()
    }
}

/// Input driver that never produces events on its own. Synthetic events
/// can be queued with [`HeadlessInputDriver::push_event`] and are delivered
/// in order on the next `poll()`.
#[derive(Default)]
pub struct HeadlessInputDriver {
    sink: Option<EventSink>,
    pending: VecDeque<InputEvent>,
}

impl HeadlessInputDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a synthetic event for the next poll.
    pub fn push_event(&mut self, event: InputEvent) {
        self.pending.push_back(event);
    }
}

impl InputDriver for HeadlessInputDriver {
    fn name(&self) -> &'static str {
        "headless-input"
    }

    fn priority(&self) -> u8 {
        HEADLESS_PRIORITY
    }

    fn is_available(&mut self) -> bool {
        true
    }

    fn initialize(&mut self) -> Result<()> {
        info!("HeadlessInputDriver: ready");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_event(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn poll(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            while let Some(event) = self.pending.pop_front() {
                sink(event);
            }
        }
        Ok(())
    }
}
