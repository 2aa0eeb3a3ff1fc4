//! Hardware watchdog backends.
//!
//! One backend per hardware family, each a state machine over its
//! peripheral's [port](crate::app::ports):
//!
//! ```text
//!  Uninitialized ──init()──▶ Configured ──start()──▶ Running
//!                                ▲                     │  ▲
//!                                │               stop()│  │start()
//!                        init()* │                     ▼  │
//!                                └──────────────────  Stopped   (STOPPABLE only)
//!
//!  * re-init from any state other than Uninitialized needs RECONFIGURABLE
//! ```
//!
//! The set of families is closed: [`Backend`] is an enum whose variants all
//! implement [`WatchdogBackend`], and the registry stores `Backend` values.

pub mod nrf52;
pub mod rtl872x;
pub mod task_pin;
pub mod twdt;

use log::warn;

use crate::app::ports::{NrfWdtPort, RtlWdgPort, TwdtPort};
use crate::caps::Capabilities;
use crate::error::{Error, Result};
use crate::irq::IrqLine;
use crate::schema::{WatchdogConfig, WatchdogInfo};

/// Lifecycle of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Configured,
    Running,
    Stopped,
}

/// Contract every hardware family implements.
pub trait WatchdogBackend: Send {
    /// Short family name used in log lines.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Smallest timeout the hardware can represent, in ms.
    fn min_timeout_ms(&self) -> u32;

    /// Largest timeout the hardware can represent, in ms.
    fn max_timeout_ms(&self) -> u32;

    fn state(&self) -> BackendState;

    /// Fields copied from the last successful `init`.
    fn config(&self) -> Option<WatchdogConfig>;

    /// Give the backend the line its interrupt handler must fire.
    fn bind_irq(&mut self, line: IrqLine);

    /// Validate `config` and program the hardware.
    fn init(&mut self, config: &WatchdogConfig) -> Result<()>;

    /// Enable the counter. Succeeds without re-arming if already running.
    fn start(&mut self) -> Result<()>;

    /// Disable the counter. Needs [`Capabilities::STOPPABLE`].
    fn stop(&mut self) -> Result<()>;

    /// Feed the counter. Needs [`BackendState::Running`].
    fn refresh(&mut self) -> Result<()>;

    /// Capabilities, bounds and the live running bit.
    fn info(&self) -> WatchdogInfo;
}

/// The closed set of supported hardware families.
pub enum Backend {
    Nrf52(nrf52::Nrf52Watchdog),
    Rtl872x(rtl872x::Rtl872xWatchdog),
    Twdt(twdt::TwdtWatchdog),
}

impl Backend {
    pub fn nrf52(port: impl NrfWdtPort + 'static) -> Self {
        Self::Nrf52(nrf52::Nrf52Watchdog::new(port))
    }

    pub fn rtl872x(port: impl RtlWdgPort + 'static) -> Self {
        Self::Rtl872x(rtl872x::Rtl872xWatchdog::new(port))
    }

    pub fn twdt(port: impl TwdtPort + 'static) -> Self {
        Self::Twdt(twdt::TwdtWatchdog::new(port))
    }
}

macro_rules! dispatch {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            Backend::Nrf52($b) => $body,
            Backend::Rtl872x($b) => $body,
            Backend::Twdt($b) => $body,
        }
    };
}

impl WatchdogBackend for Backend {
    fn name(&self) -> &'static str {
        dispatch!(self, b => b.name())
    }

    fn capabilities(&self) -> Capabilities {
        dispatch!(self, b => b.capabilities())
    }

    fn min_timeout_ms(&self) -> u32 {
        dispatch!(self, b => b.min_timeout_ms())
    }

    fn max_timeout_ms(&self) -> u32 {
        dispatch!(self, b => b.max_timeout_ms())
    }

    fn state(&self) -> BackendState {
        dispatch!(self, b => b.state())
    }

    fn config(&self) -> Option<WatchdogConfig> {
        dispatch!(self, b => b.config())
    }

    fn bind_irq(&mut self, line: IrqLine) {
        dispatch!(self, b => b.bind_irq(line));
    }

    fn init(&mut self, config: &WatchdogConfig) -> Result<()> {
        dispatch!(self, b => b.init(config))
    }

    fn start(&mut self) -> Result<()> {
        dispatch!(self, b => b.start())
    }

    fn stop(&mut self) -> Result<()> {
        dispatch!(self, b => b.stop())
    }

    fn refresh(&mut self) -> Result<()> {
        dispatch!(self, b => b.refresh())
    }

    fn info(&self) -> WatchdogInfo {
        dispatch!(self, b => b.info())
    }
}

// ── Shared helpers ────────────────────────────────────────────

/// Checks every backend runs before its first register write in `init`.
pub(crate) fn check_init(
    backend: &dyn WatchdogBackend,
    config: &WatchdogConfig,
) -> Result<()> {
    config.validate()?;

    let caps = backend.capabilities();
    if backend.state() != BackendState::Uninitialized
        && !caps.contains(Capabilities::RECONFIGURABLE)
    {
        warn!(
            "wdt({}): already configured and not reconfigurable",
            backend.name()
        );
        return Err(Error::InvalidState);
    }

    let bounds = backend.min_timeout_ms()..=backend.max_timeout_ms();
    if !bounds.contains(&config.timeout_ms) {
        warn!(
            "wdt({}): timeout {} ms outside [{}, {}]",
            backend.name(),
            config.timeout_ms,
            bounds.start(),
            bounds.end()
        );
        return Err(Error::InvalidArgument);
    }

    if !config.hard_reset {
        caps.require(Capabilities::INTERRUPT)?;
    }
    Ok(())
}

/// Info record for `backend` with the given effective timeout and live status.
pub(crate) fn info_for(backend: &dyn WatchdogBackend, timeout_ms: u32, running: bool) -> WatchdogInfo {
    WatchdogInfo {
        capabilities: backend.capabilities(),
        timeout_ms,
        min_timeout_ms: backend.min_timeout_ms(),
        max_timeout_ms: backend.max_timeout_ms(),
        running,
        ..WatchdogInfo::default()
    }
}

// ── Unit conversion ───────────────────────────────────────────
//
// Requests round up to whole ticks; effective periods round down to whole
// milliseconds. Both directions keep the effective timeout >= the request.

/// Smallest tick count whose period is at least `ms`.
pub const fn ms_to_ticks_ceil(ms: u32, hz: u64) -> u64 {
    (ms as u64 * hz).div_ceil(1000)
}

/// Whole milliseconds fully covered by `ticks`.
pub const fn ticks_to_ms_floor(ticks: u64, hz: u64) -> u64 {
    ticks * 1000 / hz
}

/// Smallest whole millisecond count not shorter than `ticks`.
pub const fn ticks_to_ms_ceil(ticks: u64, hz: u64) -> u64 {
    (ticks * 1000).div_ceil(hz)
}
