//! ESP32 Task Watchdog Timer backend.
//!
//! The TWDT is driven through the ESP-IDF `esp_task_wdt_*` API. Starting
//! the watchdog subscribes the owning task; feeding resets the task's
//! entry. With `hard_reset` the TWDT panics (and the panic handler resets
//! the chip); without it only the user interrupt hook runs.

use log::{error, info, warn};

use super::{BackendState, WatchdogBackend, check_init, info_for};
use crate::app::ports::{PortError, TwdtPort};
use crate::caps::Capabilities;
use crate::error::{Error, Result};
use crate::irq::IrqLine;
use crate::schema::{WatchdogConfig, WatchdogInfo};

pub const MIN_TIMEOUT_MS: u32 = 1;
/// ESP-IDF converts the period to microseconds in a `u32`.
pub const MAX_TIMEOUT_MS: u32 = u32::MAX / 1000;

const CAPABILITIES: Capabilities = Capabilities::SOFT_RESET
    .union(Capabilities::INTERRUPT)
    .union(Capabilities::RECONFIGURABLE)
    .union(Capabilities::STOPPABLE);

fn vendor(op: &str, err: PortError) -> Error {
    error!("wdt(twdt): {op} failed: {err}");
    Error::Internal
}

pub struct TwdtWatchdog {
    port: Box<dyn TwdtPort>,
    state: BackendState,
    config: Option<WatchdogConfig>,
    timeout_ms: u32,
    irq: Option<IrqLine>,
}

impl TwdtWatchdog {
    pub fn new(port: impl TwdtPort + 'static) -> Self {
        let mut twdt = Self {
            port: Box::new(port),
            state: BackendState::Uninitialized,
            config: None,
            timeout_ms: 0,
            irq: None,
        };
        if twdt.port.is_subscribed() {
            twdt.timeout_ms = twdt.port.timeout_ms().unwrap_or_default();
            twdt.state = BackendState::Running;
            warn!("wdt(twdt): task already subscribed ({} ms), adopting", twdt.timeout_ms);
        }
        twdt
    }

    fn confirm_subscribed(&self, want: bool) -> Result<()> {
        if self.port.is_subscribed() == want {
            Ok(())
        } else {
            error!("wdt(twdt): subscription readback != {}", want);
            Err(Error::Internal)
        }
    }
}

impl WatchdogBackend for TwdtWatchdog {
    fn name(&self) -> &'static str {
        "twdt"
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn min_timeout_ms(&self) -> u32 {
        MIN_TIMEOUT_MS
    }

    fn max_timeout_ms(&self) -> u32 {
        MAX_TIMEOUT_MS
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn config(&self) -> Option<WatchdogConfig> {
        self.config
    }

    fn bind_irq(&mut self, line: IrqLine) {
        self.irq = Some(line);
    }

    fn init(&mut self, config: &WatchdogConfig) -> Result<()> {
        check_init(&*self, config)?;
        if !config.hard_reset {
            let line = self.irq.clone().ok_or(Error::InvalidState)?;
            self.port.attach_interrupt(line);
        }
        self.port
            .reconfigure(config.timeout_ms, config.hard_reset)
            .map_err(|e| vendor("reconfigure", e))?;
        self.timeout_ms = config.timeout_ms;
        self.config = Some(*config);

        if self.state == BackendState::Running {
            // New period takes effect from a fresh countdown.
            self.port.reset().map_err(|e| vendor("reset", e))?;
            self.confirm_subscribed(true)?;
        } else {
            self.state = BackendState::Configured;
        }

        info!(
            "wdt(twdt): {} ms, {}",
            self.timeout_ms,
            if config.hard_reset { "panic on expiry" } else { "interrupt only" }
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        match self.state {
            BackendState::Uninitialized => Err(Error::InvalidState),
            BackendState::Running if self.port.is_subscribed() => Ok(()),
            _ => {
                if !self.port.is_subscribed() {
                    self.port.subscribe().map_err(|e| vendor("subscribe", e))?;
                }
                self.confirm_subscribed(true)?;
                self.state = BackendState::Running;
                info!("wdt(twdt): started");
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        CAPABILITIES.require(Capabilities::STOPPABLE)?;
        if self.port.is_subscribed() {
            self.port.unsubscribe().map_err(|e| vendor("unsubscribe", e))?;
            self.confirm_subscribed(false)?;
            info!("wdt(twdt): stopped");
        }
        if self.state == BackendState::Running {
            self.state = BackendState::Stopped;
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        if self.state != BackendState::Running {
            return Err(Error::InvalidState);
        }
        self.port.reset().map_err(|e| vendor("reset", e))
    }

    fn info(&self) -> WatchdogInfo {
        info_for(self, self.timeout_ms, self.port.is_subscribed())
    }
}
