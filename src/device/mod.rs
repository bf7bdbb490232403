// src/device/mod.rs

//! Device manager: registers driver constructors, probes availability, and
//! selects exactly one active display driver and one active input driver
//! using priority-ordered fallback.
//!
//! Priority-ordered probing lets the same binary run unmodified against a
//! physical matrix, a terminal, or headless in CI. A candidate reporting
//! unavailable is not an error; only exhausting a registry is.

pub mod driver;
pub mod drivers;

pub use driver::{DisplayDriver, EventSink, InputDriver, PixelGrid};

use anyhow::{bail, Context, Result};
use log::{debug, info};

/// Constructor closure for a display driver candidate.
pub type DisplayCtor = Box<dyn FnOnce() -> Box<dyn DisplayDriver>>;
/// Constructor closure for an input driver candidate.
pub type InputCtor = Box<dyn FnOnce() -> Box<dyn InputDriver>>;

/// Owns the driver registries and, after a successful [`initialize`],
/// the two active driver instances.
///
/// [`initialize`]: DeviceManager::initialize
#[derive(Default)]
pub struct DeviceManager {
    display_registry: Vec<DisplayCtor>,
    input_registry: Vec<InputCtor>,
    display: Option<Box<dyn DisplayDriver>>,
    input: Option<Box<dyn InputDriver>>,
    initialized: bool,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a display driver constructor to the registry.
    pub fn register_display_driver(&mut self, ctor: DisplayCtor) {
        self.display_registry.push(ctor);
    }

    /// Appends an input driver constructor to the registry.
    pub fn register_input_driver(&mut self, ctor: InputCtor) {
        self.input_registry.push(ctor);
    }

    /// Instantiates every registered candidate, sorts by descending
    /// priority (ties keep registration order), probes availability in
    /// order, and selects the first available candidate per registry.
    /// `initialize()` is called only on the selected instances.
    ///
    /// Fails if either registry has no available candidate; a system with
    /// no display or no input is unusable, so callers should treat this as
    /// fatal.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            bail!("device manager already initialized");
        }

        let display_candidates: Vec<Box<dyn DisplayDriver>> =
            self.display_registry.drain(..).map(|ctor| ctor()).collect();
        let input_candidates: Vec<Box<dyn InputDriver>> =
            self.input_registry.drain(..).map(|ctor| ctor()).collect();

        let mut display = select(display_candidates, |d| d.priority(), |d| d.name(), |d| {
            d.is_available()
        })
        .context("no display driver available")?;
        let mut input = select(input_candidates, |d| d.priority(), |d| d.name(), |d| {
            d.is_available()
        })
        .context("no input driver available")?;

        display
            .initialize()
            .with_context(|| format!("failed to initialize display driver '{}'", display.name()))?;
        input
            .initialize()
            .with_context(|| format!("failed to initialize input driver '{}'", input.name()))?;

        info!(
            "DeviceManager: display '{}' ({}x{}), input '{}'",
            display.name(),
            display.width(),
            display.height(),
            input.name()
        );

        self.display = Some(display);
        self.input = Some(input);
        self.initialized = true;
        Ok(())
    }

    /// Shuts down both active drivers and clears active state. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(mut display) = self.display.take() {
            display
                .shutdown()
                .with_context(|| format!("display driver '{}' shutdown failed", display.name()))?;
        }
        if let Some(mut input) = self.input.take() {
            input
                .shutdown()
                .with_context(|| format!("input driver '{}' shutdown failed", input.name()))?;
        }
        self.initialized = false;
        Ok(())
    }

    /// The active display driver. Errors before a successful `initialize()`.
    pub fn display(&self) -> Result<&dyn DisplayDriver> {
        match self.display.as_deref() {
            Some(d) => Ok(d),
            None => bail!("device manager not initialized"),
        }
    }

    pub fn display_mut(&mut self) -> Result<&mut dyn DisplayDriver> {
        match self.display.as_deref_mut() {
            Some(d) => Ok(d),
            None => bail!("device manager not initialized"),
        }
    }

    /// The active input driver. Errors before a successful `initialize()`.
    pub fn input_mut(&mut self) -> Result<&mut dyn InputDriver> {
        match self.input.as_deref_mut() {
            Some(d) => Ok(d),
            None => bail!("device manager not initialized"),
        }
    }

    /// Registers the single sink for input events with the active input
    /// driver. Re-registration replaces the previous sink.
    pub fn on_input(&mut self, sink: EventSink) -> Result<()> {
        self.input_mut()?.on_event(sink);
        Ok(())
    }
}

/// Priority-ordered selection over instantiated candidates.
fn select<D: ?Sized>(
    candidates: Vec<Box<D>>,
    priority: impl Fn(&D) -> u8,
    name: impl Fn(&D) -> &'static str,
    mut available: impl FnMut(&mut D) -> bool,
) -> Option<Box<D>> {
    let mut candidates = candidates;
    // Stable sort keeps registration order among equal priorities.
    candidates.sort_by_key(|c| std::cmp::Reverse(priority(c.as_ref())));
    for mut candidate in candidates {
        if available(candidate.as_mut()) {
            info!(
                "DeviceManager: selected '{}' (priority {})",
                name(candidate.as_ref()),
                priority(candidate.as_ref())
            );
            return Some(candidate);
        }
        debug!(
            "DeviceManager: '{}' (priority {}) unavailable, falling through",
            name(candidate.as_ref()),
            priority(candidate.as_ref())
        );
    }
    None
}
