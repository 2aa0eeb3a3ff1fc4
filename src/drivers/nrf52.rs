//! nRF52840 WDT backend.
//!
//! The WDT counts down on the 32.768 kHz LFCLK from the CRV register. Once
//! TASKS_START has been triggered it cannot be stopped or reprogrammed
//! until the next full reset, and it keeps running across resets that do
//! not power-cycle the chip.
//!
//! ## Expiry
//!
//! With the TIMEOUT interrupt enabled, the handler gets two LFCLK cycles
//! (~61 µs) before the chip resets. The interrupt cannot prevent the
//! reset; it only lets the callback run ahead of it.
//!
//! ## Timing
//!
//! `timeout = (CRV + 1) / 32768 s`, `CRV ∈ [0xF, 0xFFFF_FFFF]`.

use log::{error, info, warn};

use super::{
    BackendState, WatchdogBackend, check_init, info_for, ms_to_ticks_ceil, ticks_to_ms_ceil,
    ticks_to_ms_floor,
};
use crate::app::ports::NrfWdtPort;
use crate::caps::Capabilities;
use crate::error::{Error, Result};
use crate::irq::IrqLine;
use crate::schema::{WatchdogConfig, WatchdogInfo};

/// LFCLK frequency driving the counter.
pub const LFCLK_HZ: u64 = 32_768;
/// Smallest CRV value the peripheral accepts.
pub const CRV_MIN: u32 = 0xF;
/// Largest CRV value.
pub const CRV_MAX: u32 = u32::MAX;

pub const MIN_TIMEOUT_MS: u32 = ticks_to_ms_ceil(CRV_MIN as u64 + 1, LFCLK_HZ) as u32;
pub const MAX_TIMEOUT_MS: u32 = ticks_to_ms_floor(CRV_MAX as u64 + 1, LFCLK_HZ) as u32;

/// Reload request register used for feeding.
const RELOAD_CHANNEL: u8 = 0;

/// CRV value for a period of at least `ms`, or `None` if out of range.
pub fn crv_for_ms(ms: u32) -> Option<u32> {
    let crv = ms_to_ticks_ceil(ms, LFCLK_HZ).checked_sub(1)?;
    u32::try_from(crv).ok().map(|crv| crv.max(CRV_MIN))
}

/// Effective period of `crv`, rounded down to whole milliseconds.
pub fn ms_for_crv(crv: u32) -> u32 {
    ticks_to_ms_floor(u64::from(crv) + 1, LFCLK_HZ) as u32
}

pub struct Nrf52Watchdog {
    port: Box<dyn NrfWdtPort>,
    capabilities: Capabilities,
    state: BackendState,
    config: Option<WatchdogConfig>,
    timeout_ms: u32,
    irq: Option<IrqLine>,
}

impl Nrf52Watchdog {
    /// Wrap the peripheral. A WDT still running from before the last reset
    /// is adopted as `Running` so the application can keep feeding it.
    pub fn new(port: impl NrfWdtPort + 'static) -> Self {
        let capabilities = if port.timeout_vector_available() {
            Capabilities::INTERRUPT
        } else {
            Capabilities::NONE
        };
        let mut wdt = Self {
            port: Box::new(port),
            capabilities,
            state: BackendState::Uninitialized,
            config: None,
            timeout_ms: 0,
            irq: None,
        };
        if wdt.port.is_running() {
            wdt.timeout_ms = ms_for_crv(wdt.port.reload_value());
            wdt.state = BackendState::Running;
            warn!(
                "wdt(nrf52): still running from before reset ({} ms), adopting",
                wdt.timeout_ms
            );
        }
        wdt
    }
}

impl WatchdogBackend for Nrf52Watchdog {
    fn name(&self) -> &'static str {
        "nrf52"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
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
        let crv = crv_for_ms(config.timeout_ms).ok_or(Error::InvalidArgument)?;
        let line = if config.hard_reset {
            None
        } else {
            Some(self.irq.clone().ok_or(Error::InvalidState)?)
        };

        self.port.set_reload_value(crv);
        // Keep counting through sleep; pause while a debugger halts the core.
        self.port.set_behaviour(true, false);
        self.port.enable_reload_channel(RELOAD_CHANNEL);
        let interrupt = line.is_some();
        if let Some(line) = line {
            self.port.enable_timeout_interrupt(line);
        }

        self.timeout_ms = ms_for_crv(crv);
        self.config = Some(*config);
        self.state = BackendState::Configured;
        info!(
            "wdt(nrf52): configured CRV={:#x} ({} ms, interrupt={})",
            crv, self.timeout_ms, interrupt
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        match self.state {
            BackendState::Uninitialized => Err(Error::InvalidState),
            BackendState::Running if self.port.is_running() => Ok(()),
            _ => {
                self.port.start();
                if !self.port.is_running() {
                    error!("wdt(nrf52): RUNSTATUS still clear after TASKS_START");
                    return Err(Error::Internal);
                }
                self.state = BackendState::Running;
                info!("wdt(nrf52): started");
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        // TASKS_START is one-way on this peripheral.
        self.capabilities.require(Capabilities::STOPPABLE)
    }

    fn refresh(&mut self) -> Result<()> {
        if self.state != BackendState::Running {
            return Err(Error::InvalidState);
        }
        self.port.feed(RELOAD_CHANNEL);
        Ok(())
    }

    fn info(&self) -> WatchdogInfo {
        info_for(self, self.timeout_ms, self.port.is_running())
    }
}
