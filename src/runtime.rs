// src/runtime.rs

//! The cooperative scheduler that drives exactly one foreground app.
//!
//! The runtime owns the pixel buffer, the device manager, and the
//! registered apps. Each frame it advances the notification manager, fans
//! out throttled ticks to backgrounded apps, pumps and routes input,
//! updates the foreground app, and (when something changed) renders,
//! composites the notification overlay, and blits to the active display.
//!
//! Apps are in-process cooperative units: their callbacks must return
//! promptly, since the whole runtime is unresponsive for the duration of
//! any blocking call. A soft watchdog logs frames that overrun the target
//! interval; it never preempts.
//!
//! Every call into app-supplied code is isolated: an `Err` from an app
//! hook is caught, logged, recorded as the single-shot last error, and
//! recovered by force-switching to the launcher. Only a launcher fault (or
//! a fault with no launcher registered) halts the scheduler.

use crate::buffer::PixelBuffer;
use crate::config::Config;
use crate::device::DeviceManager;
use crate::keys::{InputEvent, KeySymbol};
use crate::notify::NotificationManager;
use crate::storage::Storage;
use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Backgrounded apps receive one tick roughly this often.
pub const BACKGROUND_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A cooperatively scheduled application.
///
/// The runtime reads `dirty()` after each update to decide whether to
/// re-render and re-blit; it never writes the flag. `on_activate` may block
/// to preload resources (it runs during a switch, never inside the frame
/// loop); every other hook must return promptly.
pub trait App {
    fn name(&self) -> &str;

    /// Called when the app becomes foreground, before it receives any
    /// update/render/input calls.
    fn on_activate(&mut self, ctx: &mut OsContext) -> Result<()>;

    /// Called when the app leaves the foreground.
    fn on_deactivate(&mut self, ctx: &mut OsContext);

    /// Per-frame update with the measured delta time in seconds.
    /// Foreground only.
    fn on_update(&mut self, dt: f32, ctx: &mut OsContext) -> Result<()>;

    /// Coarse periodic tick while backgrounded. Optional.
    fn on_background_tick(&mut self, _ctx: &mut OsContext) -> Result<()> {
        Ok(())
    }

    /// Input delivery; return `true` when the event was handled.
    fn on_event(&mut self, event: &InputEvent, ctx: &mut OsContext) -> Result<bool>;

    /// Draws the app's visual state into the buffer.
    fn render(&mut self, buffer: &mut PixelBuffer) -> Result<()>;

    /// Whether the visual state changed since the last render.
    fn dirty(&self) -> bool;
}

/// Context handle passed into every app hook: notifications, persistence,
/// and shutdown requests, with no global state behind it.
pub struct OsContext {
    pub notifications: NotificationManager,
    pub storage: Box<dyn Storage>,
    shutdown_requested: bool,
}

impl OsContext {
    pub fn new(notifications: NotificationManager, storage: Box<dyn Storage>) -> Self {
        OsContext {
            notifications,
            storage,
            shutdown_requested: false,
        }
    }

    /// Asks the runtime to stop. The frame in progress always completes;
    /// only the next frame is prevented.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    fn take_shutdown_request(&mut self) -> bool {
        std::mem::take(&mut self.shutdown_requested)
    }
}

/// Status of the runtime after a frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RuntimeStatus {
    /// The frame completed and the loop should continue.
    Running,
    /// A shutdown was requested; the loop should exit gracefully.
    Shutdown,
}

/// Descriptor of the most recent isolated app fault, for the launcher to
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFault {
    pub app: String,
    pub message: String,
}

/// The fixed-rate cooperative scheduler.
pub struct AppRuntime {
    devices: DeviceManager,
    buffer: PixelBuffer,
    ctx: OsContext,
    apps: Vec<Box<dyn App>>,
    foreground: Option<usize>,
    launcher: Option<String>,
    pending_events: Rc<RefCell<VecDeque<InputEvent>>>,
    background_accum: Duration,
    last_error: Option<AppFault>,
    target_frame: Duration,
    running: bool,
}

impl AppRuntime {
    /// Builds a runtime on top of an initialized device manager. The pixel
    /// buffer is sized to the active display driver's reported dimensions,
    /// and the runtime registers itself as the single input sink.
    pub fn new(
        mut devices: DeviceManager,
        config: &Config,
        storage: Box<dyn Storage>,
    ) -> Result<Self> {
        let (width, height) = {
            let display = devices.display().context("runtime needs an active display")?;
            (display.width(), display.height())
        };
        let buffer = PixelBuffer::new(width, height);

        let pending_events: Rc<RefCell<VecDeque<InputEvent>>> =
            Rc::new(RefCell::new(VecDeque::new()));
        let sink_queue = Rc::clone(&pending_events);
        devices.on_input(Box::new(move |event| {
            sink_queue.borrow_mut().push_back(event);
        }))?;

        let fps = config.performance.target_fps.max(1);
        Ok(AppRuntime {
            devices,
            buffer,
            ctx: OsContext::new(NotificationManager::new(), storage),
            apps: Vec::new(),
            foreground: None,
            launcher: None,
            pending_events,
            background_accum: Duration::ZERO,
            last_error: None,
            target_frame: Duration::from_secs(1) / fps,
            running: true,
        })
    }

    /// Registers an app. Apps persist for the process lifetime; only their
    /// foreground/background status changes afterwards. A second
    /// registration under the same name is ignored.
    pub fn register_app(&mut self, app: Box<dyn App>) {
        if self.apps.iter().any(|a| a.name() == app.name()) {
            warn!("AppRuntime: app '{}' already registered, ignoring", app.name());
            return;
        }
        info!("AppRuntime: registered app '{}'", app.name());
        self.apps.push(app);
    }

    /// Designates the registered app `name` as the launcher: the target of
    /// system-level back navigation and of fault recovery.
    pub fn set_launcher(&mut self, name: &str) -> Result<()> {
        if !self.apps.iter().any(|a| a.name() == name) {
            bail!("cannot designate unregistered app '{}' as launcher", name);
        }
        self.launcher = Some(name.to_string());
        Ok(())
    }

    pub fn foreground_app(&self) -> Option<&str> {
        self.foreground.map(|idx| self.apps[idx].name())
    }

    /// The most recent isolated app fault. Returns it exactly once;
    /// subsequent calls return `None` until another fault occurs.
    pub fn take_last_error(&mut self) -> Option<AppFault> {
        self.last_error.take()
    }

    pub fn context_mut(&mut self) -> &mut OsContext {
        &mut self.ctx
    }

    /// Switches the foreground slot to the registered app `name`:
    /// deactivates the previous foreground app, then runs the new app's
    /// activate hook to completion before it is considered foreground.
    /// A no-op when `name` is already foreground.
    pub fn switch_to_app(&mut self, name: &str) -> Result<()> {
        let idx = match self.apps.iter().position(|a| a.name() == name) {
            Some(idx) => idx,
            None => bail!("cannot switch to unregistered app '{}'", name),
        };
        if self.foreground == Some(idx) {
            return Ok(());
        }
        if let Some(current) = self.foreground {
            debug!("AppRuntime: deactivating '{}'", self.apps[current].name());
            self.apps[current].on_deactivate(&mut self.ctx);
        }
        info!("AppRuntime: switching foreground to '{}'", name);
        self.foreground = Some(idx);
        if let Err(e) = self.apps[idx].on_activate(&mut self.ctx) {
            self.foreground = None;
            return self.recover_from_fault(idx, e);
        }
        Ok(())
    }

    /// Stops the loop. The frame in progress always completes; only the
    /// scheduling of the next frame is prevented.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Runs the fixed-rate loop until stopped or halted, then shuts the
    /// devices down. Scheduling is drift-compensated: the next frame is
    /// delayed by `max(0, target - elapsed)` so slow frames do not
    /// accumulate lag.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "AppRuntime: starting main loop (target frame {:?})",
            self.target_frame
        );
        let mut last = Instant::now();
        loop {
            let frame_start = Instant::now();
            let dt = frame_start.duration_since(last);
            last = frame_start;

            match self.step(dt) {
                Ok(RuntimeStatus::Running) => {}
                Ok(RuntimeStatus::Shutdown) => {
                    info!("AppRuntime: shutdown requested, exiting main loop");
                    break;
                }
                Err(e) => {
                    // Halt: shut devices down before propagating, so the
                    // terminal is not left in raw mode.
                    let _ = self.devices.shutdown();
                    return Err(e);
                }
            }

            let elapsed = frame_start.elapsed();
            if elapsed > self.target_frame {
                warn!(
                    "AppRuntime: slow frame ({:?} > {:?} target)",
                    elapsed, self.target_frame
                );
            }
            std::thread::sleep(self.target_frame.saturating_sub(elapsed));
        }
        self.devices.shutdown()
    }

    /// Executes one frame with the given measured delta time. Within a
    /// frame: notifications advance first, then background ticks (when
    /// due), then input routing, then the foreground update, then -- only
    /// if something changed -- render, overlay, blit, show.
    pub fn step(&mut self, dt: Duration) -> Result<RuntimeStatus> {
        if !self.running {
            return Ok(RuntimeStatus::Shutdown);
        }

        self.ctx.notifications.update(dt);

        self.background_accum += dt;
        if self.background_accum >= BACKGROUND_TICK_INTERVAL {
            self.background_accum = Duration::ZERO;
            self.background_tick_pass()?;
        }

        self.pump_input()?;

        if let Some(idx) = self.foreground {
            if let Err(e) = self.apps[idx].on_update(dt.as_secs_f32(), &mut self.ctx) {
                self.recover_from_fault(idx, e)?;
            }
        }

        self.render_if_needed()?;

        if self.ctx.take_shutdown_request() {
            self.running = false;
        }
        Ok(if self.running {
            RuntimeStatus::Running
        } else {
            RuntimeStatus::Shutdown
        })
    }

    /// One throttled tick for every non-foreground app. No app is
    /// scheduled twice in the same pass, and the foreground app never
    /// receives background ticks.
    fn background_tick_pass(&mut self) -> Result<()> {
        for idx in 0..self.apps.len() {
            if self.foreground == Some(idx) {
                continue;
            }
            if let Err(e) = self.apps[idx].on_background_tick(&mut self.ctx) {
                self.recover_from_fault(idx, e)?;
            }
        }
        Ok(())
    }

    /// Polls the input driver and routes every queued event, in production
    /// order, one at a time.
    fn pump_input(&mut self) -> Result<()> {
        self.devices
            .input_mut()?
            .poll()
            .context("input driver poll failed")?;
        loop {
            let event = match self.pending_events.borrow_mut().pop_front() {
                Some(event) => event,
                None => break,
            };
            self.route_event(event)?;
        }
        Ok(())
    }

    /// System-level input arbitration:
    /// 1. Enter while another app's notification is current accepts it --
    ///    the event switches foreground instead of being delivered.
    /// 2. Otherwise the foreground app gets the event.
    /// 3. An unhandled Escape returns to the launcher.
    fn route_event(&mut self, event: InputEvent) -> Result<()> {
        if event.symbol == KeySymbol::Enter {
            if let Some(target) = self
                .ctx
                .notifications
                .requesting_app()
                .map(str::to_string)
            {
                if self.foreground_app() != Some(target.as_str()) {
                    debug!("AppRuntime: notification accepted, opening '{}'", target);
                    self.ctx.notifications.dismiss();
                    if !self.apps.iter().any(|a| a.name() == target) {
                        warn!(
                            "AppRuntime: notification from unregistered app '{}'",
                            target
                        );
                        return Ok(());
                    }
                    return self.switch_to_app(&target);
                }
            }
        }

        if let Some(idx) = self.foreground {
            match self.apps[idx].on_event(&event, &mut self.ctx) {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => return self.recover_from_fault(idx, e),
            }
        }

        if event.symbol == KeySymbol::Escape {
            if let Some(launcher) = self.launcher.clone() {
                if self.foreground_app() != Some(launcher.as_str()) {
                    debug!("AppRuntime: unhandled Escape, returning to launcher");
                    return self.switch_to_app(&launcher);
                }
            }
        }
        Ok(())
    }

    /// Renders when the foreground app is dirty or the notification
    /// overlay changed: app render, then overlay on top, then a full blit
    /// to the display driver and `show()`.
    fn render_if_needed(&mut self) -> Result<()> {
        let idx = match self.foreground {
            Some(idx) => idx,
            None => return Ok(()),
        };
        let needs_render = self.apps[idx].dirty() || self.ctx.notifications.take_redraw();
        if !needs_render {
            return Ok(());
        }
        if let Err(e) = self.apps[idx].render(&mut self.buffer) {
            return self.recover_from_fault(idx, e);
        }
        self.ctx.notifications.render_overlay(&mut self.buffer);
        self.blit()
    }

    fn blit(&mut self) -> Result<()> {
        let display = self.devices.display_mut()?;
        for y in 0..self.buffer.height() as i32 {
            for x in 0..self.buffer.width() as i32 {
                display.set_pixel(x, y, self.buffer.get_pixel(x, y));
            }
        }
        display.show().context("display show failed")
    }

    /// Isolates a fault in app-supplied code: logs it, records the
    /// single-shot last error, and force-switches to the launcher.
    /// Returns `Err` -- halting the scheduler -- when the faulting app is
    /// the launcher or no launcher is registered.
    fn recover_from_fault(&mut self, idx: usize, err: anyhow::Error) -> Result<()> {
        let name = self.apps[idx].name().to_string();
        error!("AppRuntime: app '{}' crashed: {:#}", name, err);
        self.last_error = Some(AppFault {
            app: name.clone(),
            message: format!("{:#}", err),
        });

        let launcher = match self.launcher.clone() {
            Some(launcher) => launcher,
            None => bail!("app '{}' crashed and no launcher is registered", name),
        };
        if launcher == name {
            bail!("launcher '{}' crashed; halting", name);
        }
        if self.foreground_app() == Some(launcher.as_str()) {
            return Ok(());
        }
        info!("AppRuntime: recovering to launcher '{}'", launcher);
        self.switch_to_app(&launcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::device::driver::{DisplayDriver, EventSink, InputDriver, PixelGrid};
    use crate::keys::Modifiers;
    use crate::notify::Priority;
    use crate::storage::MemoryStorage;

    const FRAME: Duration = Duration::from_millis(20);

    /// Scripted input driver: the test holds the feed and pushes events.
    struct ScriptedInput {
        feed: Rc<RefCell<VecDeque<InputEvent>>>,
        sink: Option<EventSink>,
    }

    impl InputDriver for ScriptedInput {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn priority(&self) -> u8 {
            99
        }
        fn is_available(&mut self) -> bool {
            true
        }
        fn initialize(&mut self) -> Result<()> {
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
                while let Some(event) = self.feed.borrow_mut().pop_front() {
                    sink(event);
                }
            }
            Ok(())
        }
    }

    /// Display driver that counts `show()` calls.
    struct CountingDisplay {
        grid: PixelGrid,
        shows: Rc<RefCell<usize>>,
    }

    impl DisplayDriver for CountingDisplay {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn priority(&self) -> u8 {
            99
        }
        fn is_available(&mut self) -> bool {
            true
        }
        fn initialize(&mut self) -> Result<()> {
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
            *self.shows.borrow_mut() += 1;
            Ok(())
        }
        fn buffer(&self) -> &[Rgb] {
            self.grid.cells()
        }
    }

    #[derive(Default, Clone)]
    struct Counters {
        updates: Rc<RefCell<usize>>,
        bg_ticks: Rc<RefCell<usize>>,
        activations: Rc<RefCell<usize>>,
        deactivations: Rc<RefCell<usize>>,
        events: Rc<RefCell<Vec<KeySymbol>>>,
    }

    struct TestApp {
        name: &'static str,
        counters: Counters,
        dirty: bool,
        handles_events: bool,
        fail_update: bool,
        fail_activate: bool,
        fail_bg_tick: bool,
    }

    impl TestApp {
        fn new(name: &'static str, counters: Counters) -> Self {
            TestApp {
                name,
                counters,
                dirty: false,
                handles_events: false,
                fail_update: false,
                fail_activate: false,
                fail_bg_tick: false,
            }
        }
    }

    impl App for TestApp {
        fn name(&self) -> &str {
            self.name
        }
        fn on_activate(&mut self, _ctx: &mut OsContext) -> Result<()> {
            *self.counters.activations.borrow_mut() += 1;
            if self.fail_activate {
                bail!("activation exploded");
            }
            Ok(())
        }
        fn on_deactivate(&mut self, _ctx: &mut OsContext) {
            *self.counters.deactivations.borrow_mut() += 1;
        }
        fn on_update(&mut self, _dt: f32, _ctx: &mut OsContext) -> Result<()> {
            *self.counters.updates.borrow_mut() += 1;
            if self.fail_update {
                bail!("update exploded");
            }
            Ok(())
        }
        fn on_background_tick(&mut self, _ctx: &mut OsContext) -> Result<()> {
            *self.counters.bg_ticks.borrow_mut() += 1;
            if self.fail_bg_tick {
                bail!("background tick exploded");
            }
            Ok(())
        }
        fn on_event(&mut self, event: &InputEvent, _ctx: &mut OsContext) -> Result<bool> {
            self.counters.events.borrow_mut().push(event.symbol);
            Ok(self.handles_events)
        }
        fn render(&mut self, buffer: &mut PixelBuffer) -> Result<()> {
            buffer.set_pixel(0, 0, Rgb::WHITE);
            Ok(())
        }
        fn dirty(&self) -> bool {
            self.dirty
        }
    }

    struct Harness {
        runtime: AppRuntime,
        feed: Rc<RefCell<VecDeque<InputEvent>>>,
        shows: Rc<RefCell<usize>>,
    }

    fn harness() -> Harness {
        let feed: Rc<RefCell<VecDeque<InputEvent>>> = Rc::new(RefCell::new(VecDeque::new()));
        let shows: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));

        let mut devices = DeviceManager::new();
        let display_shows = Rc::clone(&shows);
        devices.register_display_driver(Box::new(move || {
            Box::new(CountingDisplay {
                grid: PixelGrid::new(32, 32),
                shows: display_shows,
            })
        }));
        let input_feed = Rc::clone(&feed);
        devices.register_input_driver(Box::new(move || {
            Box::new(ScriptedInput {
                feed: input_feed,
                sink: None,
            })
        }));
        devices.initialize().expect("device init");

        let runtime = AppRuntime::new(
            devices,
            &Config::default(),
            Box::new(MemoryStorage::new()),
        )
        .expect("runtime init");
        Harness {
            runtime,
            feed,
            shows,
        }
    }

    fn key(symbol: KeySymbol) -> InputEvent {
        InputEvent::key_down(symbol, Modifiers::empty(), "scripted")
    }

    #[test]
    fn crash_isolation_recovers_to_launcher() {
        let mut h = harness();
        let launcher_counters = Counters::default();
        let app_counters = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("launcher", launcher_counters.clone())));
        let mut game = TestApp::new("game", app_counters);
        game.fail_update = true;
        h.runtime.register_app(Box::new(game));
        h.runtime.set_launcher("launcher").unwrap();
        h.runtime.switch_to_app("game").unwrap();

        let status = h.runtime.step(FRAME).expect("fault must be recovered");
        assert_eq!(status, RuntimeStatus::Running);
        assert_eq!(h.runtime.foreground_app(), Some("launcher"));

        let fault = h.runtime.take_last_error().expect("fault recorded");
        assert_eq!(fault.app, "game");
        assert!(fault.message.contains("update exploded"));
        // Single-shot: consumed until the next fault.
        assert_eq!(h.runtime.take_last_error(), None);
    }

    #[test]
    fn launcher_crash_halts_the_scheduler() {
        let mut h = harness();
        let mut launcher = TestApp::new("launcher", Counters::default());
        launcher.fail_update = true;
        h.runtime.register_app(Box::new(launcher));
        h.runtime.set_launcher("launcher").unwrap();
        h.runtime.switch_to_app("launcher").unwrap();

        let err = h.runtime.step(FRAME).expect_err("launcher fault is fatal");
        assert!(err.to_string().contains("launcher"));
    }

    #[test]
    fn fault_without_launcher_halts_the_scheduler() {
        let mut h = harness();
        let mut app = TestApp::new("game", Counters::default());
        app.fail_update = true;
        h.runtime.register_app(Box::new(app));
        h.runtime.switch_to_app("game").unwrap();

        let err = h.runtime.step(FRAME).expect_err("no launcher to recover to");
        assert!(err.to_string().contains("no launcher"));
    }

    #[test]
    fn background_apps_are_throttled() {
        let mut h = harness();
        let fg = Counters::default();
        let bg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", fg.clone())));
        h.runtime
            .register_app(Box::new(TestApp::new("bg", bg.clone())));
        h.runtime.switch_to_app("fg").unwrap();

        for _ in 0..120 {
            h.runtime.step(FRAME).unwrap();
        }

        // 120 frames at 20ms = 2.4s: the foreground app updates every
        // frame, the backgrounded app ticks about once per second.
        assert_eq!(*fg.updates.borrow(), 120);
        assert_eq!(*bg.bg_ticks.borrow(), 2);
        assert_eq!(*fg.bg_ticks.borrow(), 0);
        assert_eq!(*bg.updates.borrow(), 0);
    }

    #[test]
    fn background_tick_fault_recovers_to_launcher() {
        let mut h = harness();
        h.runtime
            .register_app(Box::new(TestApp::new("launcher", Counters::default())));
        let mut flaky = TestApp::new("flaky", Counters::default());
        flaky.fail_bg_tick = true;
        h.runtime.register_app(Box::new(flaky));
        let fg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", fg.clone())));
        h.runtime.set_launcher("launcher").unwrap();
        h.runtime.switch_to_app("fg").unwrap();

        // Cross the background interval in one step.
        h.runtime.step(Duration::from_secs(2)).unwrap();
        assert_eq!(h.runtime.foreground_app(), Some("launcher"));
        assert_eq!(h.runtime.take_last_error().unwrap().app, "flaky");
    }

    #[test]
    fn switch_runs_deactivate_then_activate() {
        let mut h = harness();
        let a = Counters::default();
        let b = Counters::default();
        h.runtime.register_app(Box::new(TestApp::new("a", a.clone())));
        h.runtime.register_app(Box::new(TestApp::new("b", b.clone())));

        h.runtime.switch_to_app("a").unwrap();
        assert_eq!(*a.activations.borrow(), 1);

        h.runtime.switch_to_app("b").unwrap();
        assert_eq!(*a.deactivations.borrow(), 1);
        assert_eq!(*b.activations.borrow(), 1);

        // Switching to the current foreground is a no-op.
        h.runtime.switch_to_app("b").unwrap();
        assert_eq!(*b.activations.borrow(), 1);
    }

    #[test]
    fn activation_fault_is_recovered() {
        let mut h = harness();
        h.runtime
            .register_app(Box::new(TestApp::new("launcher", Counters::default())));
        let mut broken = TestApp::new("broken", Counters::default());
        broken.fail_activate = true;
        h.runtime.register_app(Box::new(broken));
        h.runtime.set_launcher("launcher").unwrap();

        h.runtime.switch_to_app("broken").unwrap();
        assert_eq!(h.runtime.foreground_app(), Some("launcher"));
        assert_eq!(h.runtime.take_last_error().unwrap().app, "broken");
    }

    #[test]
    fn events_reach_the_foreground_app_in_order() {
        let mut h = harness();
        let fg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", fg.clone())));
        h.runtime.switch_to_app("fg").unwrap();

        h.feed.borrow_mut().push_back(key(KeySymbol::Up));
        h.feed.borrow_mut().push_back(key(KeySymbol::Down));
        h.runtime.step(FRAME).unwrap();

        assert_eq!(*fg.events.borrow(), vec![KeySymbol::Up, KeySymbol::Down]);
    }

    #[test]
    fn unhandled_escape_returns_to_launcher() {
        let mut h = harness();
        h.runtime
            .register_app(Box::new(TestApp::new("launcher", Counters::default())));
        let fg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("game", fg.clone())));
        h.runtime.set_launcher("launcher").unwrap();
        h.runtime.switch_to_app("game").unwrap();

        h.feed.borrow_mut().push_back(key(KeySymbol::Escape));
        h.runtime.step(FRAME).unwrap();
        assert_eq!(h.runtime.foreground_app(), Some("launcher"));
        // The app saw the event first and declined it.
        assert_eq!(*fg.events.borrow(), vec![KeySymbol::Escape]);
    }

    #[test]
    fn handled_escape_stays_with_the_app() {
        let mut h = harness();
        h.runtime
            .register_app(Box::new(TestApp::new("launcher", Counters::default())));
        let fg = Counters::default();
        let mut game = TestApp::new("game", fg.clone());
        game.handles_events = true;
        h.runtime.register_app(Box::new(game));
        h.runtime.set_launcher("launcher").unwrap();
        h.runtime.switch_to_app("game").unwrap();

        h.feed.borrow_mut().push_back(key(KeySymbol::Escape));
        h.runtime.step(FRAME).unwrap();
        assert_eq!(h.runtime.foreground_app(), Some("game"));
    }

    #[test]
    fn notification_accept_switches_to_requesting_app() {
        let mut h = harness();
        let fg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", fg.clone())));
        h.runtime
            .register_app(Box::new(TestApp::new("radio", Counters::default())));
        h.runtime.switch_to_app("fg").unwrap();

        h.runtime.context_mut().notifications.request_foreground(
            "radio",
            "now playing",
            Priority::Normal,
        );
        h.feed.borrow_mut().push_back(key(KeySymbol::Enter));
        h.runtime.step(FRAME).unwrap();

        assert_eq!(h.runtime.foreground_app(), Some("radio"));
        assert_eq!(h.runtime.context_mut().notifications.requesting_app(), None);
        // The accept keypress was consumed by the system, not delivered.
        assert!(fg.events.borrow().is_empty());
    }

    #[test]
    fn own_notification_does_not_consume_enter() {
        let mut h = harness();
        let fg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", fg.clone())));
        h.runtime.switch_to_app("fg").unwrap();

        h.runtime.context_mut().notifications.request_foreground(
            "fg",
            "already here",
            Priority::Normal,
        );
        h.feed.borrow_mut().push_back(key(KeySymbol::Enter));
        h.runtime.step(FRAME).unwrap();

        assert_eq!(h.runtime.foreground_app(), Some("fg"));
        assert_eq!(*fg.events.borrow(), vec![KeySymbol::Enter]);
    }

    #[test]
    fn render_and_blit_only_when_dirty() {
        let mut h = harness();
        let mut app = TestApp::new("fg", Counters::default());
        app.dirty = false;
        h.runtime.register_app(Box::new(app));
        h.runtime.switch_to_app("fg").unwrap();

        h.runtime.step(FRAME).unwrap();
        assert_eq!(*h.shows.borrow(), 0);

        let mut h = harness();
        let mut app = TestApp::new("fg", Counters::default());
        app.dirty = true;
        h.runtime.register_app(Box::new(app));
        h.runtime.switch_to_app("fg").unwrap();

        h.runtime.step(FRAME).unwrap();
        h.runtime.step(FRAME).unwrap();
        assert_eq!(*h.shows.borrow(), 2);
    }

    #[test]
    fn overlay_change_forces_a_repaint_of_idle_apps() {
        let mut h = harness();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", Counters::default())));
        h.runtime
            .register_app(Box::new(TestApp::new("radio", Counters::default())));
        h.runtime.switch_to_app("fg").unwrap();

        h.runtime.step(FRAME).unwrap();
        assert_eq!(*h.shows.borrow(), 0);

        h.runtime.context_mut().notifications.request_foreground(
            "radio",
            "hello",
            Priority::Normal,
        );
        h.runtime.step(FRAME).unwrap();
        assert_eq!(*h.shows.borrow(), 1);
    }

    #[test]
    fn shutdown_request_completes_the_frame_in_progress() {
        let mut h = harness();
        let fg = Counters::default();
        h.runtime
            .register_app(Box::new(TestApp::new("fg", fg.clone())));
        h.runtime.switch_to_app("fg").unwrap();

        h.runtime.context_mut().request_shutdown();
        let status = h.runtime.step(FRAME).unwrap();
        assert_eq!(status, RuntimeStatus::Shutdown);
        // The frame still ran in full.
        assert_eq!(*fg.updates.borrow(), 1);
        // Subsequent frames do not run.
        assert_eq!(h.runtime.step(FRAME).unwrap(), RuntimeStatus::Shutdown);
        assert_eq!(*fg.updates.borrow(), 1);
    }
}
