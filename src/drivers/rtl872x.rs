//! Realtek RTL872x WDG backend.
//!
//! The WDG counts 32.768 kHz ticks through a prescaler (`div_fac`) and a
//! power-of-two counter (`cnt_limit`). Unlike the nRF52 WDT it can be
//! disabled and reprogrammed at any time.
//!
//! In early-interrupt mode the first expiry raises the WDG interrupt and
//! restarts the count; a second consecutive expiry resets the chip.

use log::{error, info, warn};

use super::{
    BackendState, WatchdogBackend, check_init, info_for, ms_to_ticks_ceil, ticks_to_ms_ceil,
    ticks_to_ms_floor,
};
use crate::app::ports::RtlWdgPort;
use crate::caps::Capabilities;
use crate::error::{Error, Result};
use crate::irq::IrqLine;
use crate::schema::{WatchdogConfig, WatchdogInfo};

pub const CLOCK_HZ: u64 = 32_768;
pub const DIV_FAC_MIN: u16 = 1;
pub const DIV_FAC_MAX: u16 = 0xFFFF;
pub const CNT_LIMIT_MAX: u8 = 11;

const SHORTEST: WdgDivider = WdgDivider { div_fac: DIV_FAC_MIN, cnt_limit: 0 };
const LONGEST: WdgDivider = WdgDivider { div_fac: DIV_FAC_MAX, cnt_limit: CNT_LIMIT_MAX };

pub const MIN_TIMEOUT_MS: u32 = ticks_to_ms_ceil(SHORTEST.ticks(), CLOCK_HZ) as u32;
pub const MAX_TIMEOUT_MS: u32 = ticks_to_ms_floor(LONGEST.ticks(), CLOCK_HZ) as u32;

const CAPABILITIES: Capabilities = Capabilities::INTERRUPT
    .union(Capabilities::RECONFIGURABLE)
    .union(Capabilities::STOPPABLE);

/// Prescaler and counter pair as programmed into `WDG_CTRL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WdgDivider {
    pub div_fac: u16,
    pub cnt_limit: u8,
}

impl WdgDivider {
    /// Counter span selected by `cnt_limit`: `2^(cnt_limit + 1) - 1`.
    pub const fn count(&self) -> u64 {
        let limit = if self.cnt_limit > CNT_LIMIT_MAX { CNT_LIMIT_MAX } else { self.cnt_limit };
        (1u64 << (limit + 1)) - 1
    }

    /// Clock ticks until expiry.
    pub const fn ticks(&self) -> u64 {
        (self.div_fac as u64 + 1) * self.count()
    }

    /// Effective period in whole milliseconds, rounded down.
    pub const fn timeout_ms(&self) -> u32 {
        ticks_to_ms_floor(self.ticks(), CLOCK_HZ) as u32
    }

    /// Pair with the fewest ticks that still covers `ms`, or `None` if
    /// `ms` is zero or longer than the hardware can count.
    pub fn for_timeout_ms(ms: u32) -> Option<Self> {
        if ms == 0 {
            return None;
        }
        let wanted = ms_to_ticks_ceil(ms, CLOCK_HZ);
        (0..=CNT_LIMIT_MAX)
            .filter_map(|cnt_limit| {
                let count = (1u64 << (cnt_limit + 1)) - 1;
                let div = wanted.div_ceil(count).saturating_sub(1).max(u64::from(DIV_FAC_MIN));
                let div_fac = u16::try_from(div).ok()?;
                Some(Self { div_fac, cnt_limit })
            })
            .min_by_key(Self::ticks)
    }
}

pub struct Rtl872xWatchdog {
    port: Box<dyn RtlWdgPort>,
    state: BackendState,
    config: Option<WatchdogConfig>,
    timeout_ms: u32,
    irq: Option<IrqLine>,
}

impl Rtl872xWatchdog {
    pub fn new(port: impl RtlWdgPort + 'static) -> Self {
        let mut wdg = Self {
            port: Box::new(port),
            state: BackendState::Uninitialized,
            config: None,
            timeout_ms: 0,
            irq: None,
        };
        if wdg.port.is_enabled() {
            wdg.timeout_ms = wdg.port.divider().timeout_ms();
            wdg.state = BackendState::Running;
            warn!(
                "wdt(rtl872x): enabled before init ({} ms), adopting",
                wdg.timeout_ms
            );
        }
        wdg
    }

    /// Re-enable a counter that was running before a reprogram.
    fn resume(&mut self) -> Result<()> {
        self.port.set_enabled(true);
        self.port.refresh();
        self.confirm_enabled(true)
    }

    fn confirm_enabled(&self, want: bool) -> Result<()> {
        if self.port.is_enabled() == want {
            Ok(())
        } else {
            error!("wdt(rtl872x): enable readback != {}", want);
            Err(Error::Internal)
        }
    }
}

impl WatchdogBackend for Rtl872xWatchdog {
    fn name(&self) -> &'static str {
        "rtl872x"
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
        let divider = WdgDivider::for_timeout_ms(config.timeout_ms).ok_or(Error::InvalidArgument)?;
        let line = if config.hard_reset {
            None
        } else {
            Some(self.irq.clone().ok_or(Error::InvalidState)?)
        };

        // Reprogramming a live counter: disable, write, re-enable, feed.
        // The countdown restarts with the new period.
        let live = self.state == BackendState::Running;
        let previous = (self.port.divider(), self.config.is_some_and(|c| !c.hard_reset));
        if live {
            self.port.set_enabled(false);
        }
        self.port.configure(divider, line.is_some());
        if let Some(line) = line {
            self.port.attach_interrupt(line);
        }
        if self.port.divider() != divider {
            error!("wdt(rtl872x): divider readback mismatch, restoring previous period");
            self.port.configure(previous.0, previous.1);
            if live {
                self.resume()?;
            }
            return Err(Error::Internal);
        }

        // The hardware now counts the new period whatever happens below.
        self.timeout_ms = divider.timeout_ms();
        self.config = Some(*config);
        if live {
            self.resume()?;
        } else {
            self.state = BackendState::Configured;
        }
        info!(
            "wdt(rtl872x): div_fac={} cnt_limit={} ({} ms, early_int={})",
            divider.div_fac,
            divider.cnt_limit,
            self.timeout_ms,
            !config.hard_reset
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        match self.state {
            BackendState::Uninitialized => Err(Error::InvalidState),
            BackendState::Running if self.port.is_enabled() => Ok(()),
            _ => {
                self.port.set_enabled(true);
                self.confirm_enabled(true)?;
                self.state = BackendState::Running;
                info!("wdt(rtl872x): started");
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        CAPABILITIES.require(Capabilities::STOPPABLE)?;
        if self.port.is_enabled() {
            self.port.set_enabled(false);
            self.confirm_enabled(false)?;
            info!("wdt(rtl872x): stopped");
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
        self.port.refresh();
        Ok(())
    }

    fn info(&self) -> WatchdogInfo {
        info_for(self, self.timeout_ms, self.port.is_enabled())
    }
}
