// src/main.rs

use matrix_os::device::drivers::{
    HeadlessDisplayDriver, HeadlessInputDriver, TerminalDisplayDriver, TerminalInputDriver,
};
use matrix_os::runtime::{App, AppRuntime, OsContext};
use matrix_os::{Config, DeviceManager, JsonFileStorage, PixelBuffer, Rgb};

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

/// Minimal built-in foreground app shown until an external launcher is
/// installed: identifies the system and waits for Ctrl+C / a shutdown
/// request.
struct BootScreen {
    dirty: bool,
    uptime: f32,
}

impl BootScreen {
    fn new() -> Self {
        BootScreen {
            dirty: true,
            uptime: 0.0,
        }
    }
}

impl App for BootScreen {
    fn name(&self) -> &str {
        "boot-screen"
    }

    fn on_activate(&mut self, _ctx: &mut OsContext) -> Result<()> {
        self.dirty = true;
        Ok(())
    }

    fn on_deactivate(&mut self, _ctx: &mut OsContext) {}

    fn on_update(&mut self, dt: f32, _ctx: &mut OsContext) -> Result<()> {
        let before = self.uptime as u32;
        self.uptime += dt;
        // Repaint once per second for the uptime counter.
        if self.uptime as u32 != before {
            self.dirty = true;
        }
        Ok(())
    }

    fn on_event(
        &mut self,
        event: &matrix_os::InputEvent,
        ctx: &mut OsContext,
    ) -> Result<bool> {
        if event.symbol == matrix_os::KeySymbol::Char('q') {
            ctx.request_shutdown();
            return Ok(true);
        }
        Ok(false)
    }

    fn render(&mut self, buffer: &mut PixelBuffer) -> Result<()> {
        self.dirty = false;
        buffer.clear();
        let cx = buffer.width() as i32 / 2;
        buffer.text("MATRIX-OS", cx - 27, 8, Rgb::WHITE, None, 1);
        buffer.line(4, 20, buffer.width() as i32 - 5, 20, Rgb::CYAN);
        buffer.text("NO APPS INSTALLED", cx - 51, 28, Rgb::GREY, None, 1);
        buffer.text(
            &format!("UP {}S", self.uptime as u32),
            cx - 18,
            40,
            Rgb::GREY.dimmed(160),
            None,
            1,
        );
        buffer.text("Q: QUIT", cx - 21, 52, Rgb::GREY.dimmed(120), None, 1);
        Ok(())
    }

    fn dirty(&self) -> bool {
        self.dirty
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting matrix-os...");

    let config_path = std::env::var_os("MATRIX_OS_CONFIG").map(PathBuf::from);
    let config = Config::load_or_default(config_path.as_deref())?;
    let (width, height) = (config.display.width, config.display.height);

    let mut devices = DeviceManager::new();
    devices.register_display_driver(Box::new(move || {
        Box::new(TerminalDisplayDriver::new(width, height))
    }));
    devices.register_display_driver(Box::new(move || {
        Box::new(HeadlessDisplayDriver::new(width, height))
    }));
    devices.register_input_driver(Box::new(|| Box::new(TerminalInputDriver::new())));
    devices.register_input_driver(Box::new(|| Box::new(HeadlessInputDriver::new())));
    devices
        .initialize()
        .context("device initialization failed")?;

    let storage = JsonFileStorage::open(config.storage.path.clone());
    let mut runtime = AppRuntime::new(devices, &config, Box::new(storage))
        .context("failed to build runtime")?;

    runtime.register_app(Box::new(BootScreen::new()));
    runtime.switch_to_app("boot-screen")?;

    info!("Entering main loop.");
    runtime.run()?;
    info!("matrix-os exited cleanly.");
    Ok(())
}
