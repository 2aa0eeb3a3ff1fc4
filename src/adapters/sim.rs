//! Host simulation of the watchdog peripherals.
//!
//! Each sim is a cloneable handle over shared state: one clone goes into
//! the backend as its port, the test keeps another as a probe to advance
//! time, force expiry and inspect what the backend wrote.
//!
//! Sims never fire the interrupt line from inside a port method. Expiry
//! only happens through [`advance`](SimNrfWdt::advance) or
//! [`expire`](SimNrfWdt::expire), which release the sim's lock before
//! calling into the expiry path so the callback may call straight back
//! into the facade.
//!
//! A simulated chip reset bumps `resets()` and applies what the real
//! peripheral does across a reset. Building a fresh backend over a clone
//! of the same sim models the firmware coming back up.

use core::time::Duration;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::app::ports::{NrfWdtPort, PortError, RtlWdgPort, TwdtPort};
use crate::drivers::rtl872x::{self, WdgDivider};
use crate::drivers::nrf52;
use crate::irq::IrqLine;

/// `ESP_ERR_INVALID_STATE`
pub const ESP_ERR_INVALID_STATE: i32 = 0x103;
/// `ESP_ERR_NOT_FOUND`
pub const ESP_ERR_NOT_FOUND: i32 = 0x105;

fn ticks_to_duration(ticks: u64, hz: u64) -> Duration {
    let nanos = u128::from(ticks) * 1_000_000_000 / u128::from(hz);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Period and time left of a running counter.
#[derive(Debug, Default, Clone, Copy)]
struct Countdown {
    period: Duration,
    remaining: Duration,
}

impl Countdown {
    fn reload(&mut self) {
        self.remaining = self.period;
    }

    fn program(&mut self, period: Duration) {
        self.period = period;
        self.remaining = period;
    }

    /// Consume `by`; `true` if the counter hit zero.
    fn elapse(&mut self, by: Duration) -> bool {
        match self.remaining.checked_sub(by) {
            Some(left) if !left.is_zero() => {
                self.remaining = left;
                false
            }
            _ => {
                self.remaining = Duration::ZERO;
                true
            }
        }
    }
}

/// Drive `sim` forward in steps of at most one expiry.
macro_rules! advance_impl {
    ($self:ident, $by:ident, $running:expr) => {{
        let mut left = $by;
        loop {
            let step = {
                let s = $self.state.lock();
                if !$running(&*s) {
                    return;
                }
                s.countdown.remaining
            };
            if left < step {
                $self.state.lock().countdown.elapse(left);
                return;
            }
            left -= step;
            $self.state.lock().countdown.elapse(step);
            $self.expire();
        }
    }};
}

// ───────────────────────────────────────────────────────────────
// nRF52840 WDT
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct NrfState {
    crv: u32,
    run_in_sleep: bool,
    run_in_halt: bool,
    reload_channels: u8,
    irq: Option<IrqLine>,
    running: bool,
    countdown: Countdown,
    feeds: u32,
    resets: u32,
    start_ignored: bool,
    vector_claimed: bool,
}

/// Simulated nRF52840 WDT. Survives chip resets; only
/// [`power_cycle`](Self::power_cycle) stops it.
#[derive(Debug, Clone, Default)]
pub struct SimNrfWdt {
    state: Arc<Mutex<NrfState>>,
}

impl SimNrfWdt {
    pub fn new() -> Self {
        Self::default()
    }

    /// A board where something else owns the WDT vector.
    pub fn without_interrupt() -> Self {
        let sim = Self::default();
        sim.state.lock().vector_claimed = true;
        sim
    }

    /// Let `by` pass on the LFCLK, expiring as many times as it covers.
    pub fn advance(&self, by: Duration) {
        advance_impl!(self, by, |s: &NrfState| s.running);
    }

    /// Counter reached zero: TIMEOUT event, then the unavoidable reset.
    pub fn expire(&self) {
        let irq = {
            let s = self.state.lock();
            if !s.running {
                return;
            }
            s.irq.clone()
        };
        if let Some(line) = irq {
            line.fire();
        }
        let mut s = self.state.lock();
        s.resets += 1;
        // The WDT keeps its configuration and keeps counting.
        s.countdown.reload();
        debug!("sim(nrf52): reset #{}", s.resets);
    }

    /// Full power loss: every register back to its reset value.
    pub fn power_cycle(&self) {
        let mut s = self.state.lock();
        *s = NrfState {
            vector_claimed: s.vector_claimed,
            ..NrfState::default()
        };
    }

    /// Make TASKS_START have no effect, so RUNSTATUS never sets.
    pub fn ignore_start(&self, ignore: bool) {
        self.state.lock().start_ignored = ignore;
    }

    pub fn feeds(&self) -> u32 {
        self.state.lock().feeds
    }

    pub fn resets(&self) -> u32 {
        self.state.lock().resets
    }

    pub fn crv(&self) -> u32 {
        self.state.lock().crv
    }

    /// `(run_in_sleep, run_in_halt)` as last written.
    pub fn behaviour(&self) -> (bool, bool) {
        let s = self.state.lock();
        (s.run_in_sleep, s.run_in_halt)
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.state.lock().irq.is_some()
    }

    pub fn remaining(&self) -> Option<Duration> {
        let s = self.state.lock();
        s.running.then_some(s.countdown.remaining)
    }
}

impl NrfWdtPort for SimNrfWdt {
    fn set_reload_value(&mut self, crv: u32) {
        let mut s = self.state.lock();
        // CRV is write-protected once the WDT runs.
        if !s.running {
            s.crv = crv;
        }
    }

    fn reload_value(&self) -> u32 {
        self.state.lock().crv
    }

    fn set_behaviour(&mut self, run_in_sleep: bool, run_in_halt: bool) {
        let mut s = self.state.lock();
        s.run_in_sleep = run_in_sleep;
        s.run_in_halt = run_in_halt;
    }

    fn enable_reload_channel(&mut self, channel: u8) {
        self.state.lock().reload_channels |= 1 << (channel & 7);
    }

    fn enable_timeout_interrupt(&mut self, line: IrqLine) {
        self.state.lock().irq = Some(line);
    }

    fn timeout_vector_available(&self) -> bool {
        !self.state.lock().vector_claimed
    }

    fn start(&mut self) {
        let mut s = self.state.lock();
        if s.start_ignored || s.running {
            return;
        }
        s.running = true;
        let period = ticks_to_duration(u64::from(s.crv) + 1, nrf52::LFCLK_HZ);
        s.countdown.program(period);
    }

    fn feed(&mut self, channel: u8) {
        let mut s = self.state.lock();
        if s.running && s.reload_channels & (1 << (channel & 7)) != 0 {
            s.countdown.reload();
            s.feeds += 1;
        }
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

// ───────────────────────────────────────────────────────────────
// RTL872x WDG
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RtlState {
    divider: WdgDivider,
    early_interrupt: bool,
    early_fired: bool,
    irq: Option<IrqLine>,
    enabled: bool,
    countdown: Countdown,
    refreshes: u32,
    resets: u32,
    enable_stuck: bool,
    divider_locked: bool,
}

/// Simulated RTL872x WDG. A chip reset clears the enable bit.
#[derive(Debug, Clone, Default)]
pub struct SimRtlWdg {
    state: Arc<Mutex<RtlState>>,
}

impl SimRtlWdg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        advance_impl!(self, by, |s: &RtlState| s.enabled);
    }

    /// Counter reached zero. In early-interrupt mode the first expiry
    /// raises the interrupt and restarts the count; the next one resets.
    pub fn expire(&self) {
        let irq = {
            let mut s = self.state.lock();
            if !s.enabled {
                return;
            }
            if s.early_interrupt && !s.early_fired {
                s.early_fired = true;
                s.countdown.reload();
                s.irq.clone()
            } else {
                s.resets += 1;
                s.enabled = false;
                s.early_fired = false;
                debug!("sim(rtl872x): reset #{}", s.resets);
                None
            }
        };
        if let Some(line) = irq {
            line.fire();
        }
    }

    /// Make writes to the enable bit have no effect.
    pub fn stick_enable(&self, stuck: bool) {
        self.state.lock().enable_stuck = stuck;
    }

    /// Make writes to the divider/count register have no effect.
    pub fn lock_divider(&self, locked: bool) {
        self.state.lock().divider_locked = locked;
    }

    pub fn refreshes(&self) -> u32 {
        self.state.lock().refreshes
    }

    pub fn resets(&self) -> u32 {
        self.state.lock().resets
    }

    pub fn divider(&self) -> WdgDivider {
        self.state.lock().divider
    }

    pub fn early_interrupt(&self) -> bool {
        self.state.lock().early_interrupt
    }

    pub fn remaining(&self) -> Option<Duration> {
        let s = self.state.lock();
        s.enabled.then_some(s.countdown.remaining)
    }
}

impl RtlWdgPort for SimRtlWdg {
    fn configure(&mut self, divider: WdgDivider, early_interrupt: bool) {
        let mut s = self.state.lock();
        if s.divider_locked {
            return;
        }
        s.divider = divider;
        s.early_interrupt = early_interrupt;
        s.early_fired = false;
        s.countdown
            .program(ticks_to_duration(divider.ticks(), rtl872x::CLOCK_HZ));
    }

    fn divider(&self) -> WdgDivider {
        self.state.lock().divider
    }

    fn attach_interrupt(&mut self, line: IrqLine) {
        self.state.lock().irq = Some(line);
    }

    fn set_enabled(&mut self, enabled: bool) {
        let mut s = self.state.lock();
        if s.enable_stuck {
            return;
        }
        if enabled && !s.enabled {
            s.countdown.reload();
            s.early_fired = false;
        }
        s.enabled = enabled;
    }

    fn refresh(&mut self) {
        let mut s = self.state.lock();
        s.countdown.reload();
        s.early_fired = false;
        s.refreshes += 1;
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }
}

// ───────────────────────────────────────────────────────────────
// ESP32 TWDT
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TwdtState {
    timeout_ms: Option<u32>,
    trigger_panic: bool,
    subscribed: bool,
    irq: Option<IrqLine>,
    countdown: Countdown,
    feeds: u32,
    resets: u32,
    fail_next: Option<i32>,
    fail_skip: u32,
}

impl TwdtState {
    fn take_failure(&mut self) -> Result<(), PortError> {
        if self.fail_next.is_some() && self.fail_skip > 0 {
            self.fail_skip -= 1;
            return Ok(());
        }
        self.fail_next.take().map_or(Ok(()), |code| Err(PortError(code)))
    }
}

/// Simulated ESP-IDF task watchdog for one subscribed task.
#[derive(Debug, Clone, Default)]
pub struct SimTwdt {
    state: Arc<Mutex<TwdtState>>,
}

impl SimTwdt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        advance_impl!(self, by, |s: &TwdtState| s.subscribed);
    }

    /// The subscribed task missed its deadline. With `trigger_panic` the
    /// chip resets and the TWDT comes back unsubscribed.
    pub fn expire(&self) {
        let irq = {
            let mut s = self.state.lock();
            if !s.subscribed {
                return;
            }
            if s.trigger_panic {
                s.resets += 1;
                s.subscribed = false;
                debug!("sim(twdt): panic reset #{}", s.resets);
                None
            } else {
                s.countdown.reload();
                s.irq.clone()
            }
        };
        if let Some(line) = irq {
            line.fire();
        }
    }

    /// Make the next ESP-IDF call fail with `code`.
    pub fn fail_next(&self, code: i32) {
        self.fail_after(0, code);
    }

    /// Let `calls` ESP-IDF calls succeed, then fail the next one with `code`.
    pub fn fail_after(&self, calls: u32, code: i32) {
        let mut s = self.state.lock();
        s.fail_skip = calls;
        s.fail_next = Some(code);
    }

    pub fn feeds(&self) -> u32 {
        self.state.lock().feeds
    }

    pub fn resets(&self) -> u32 {
        self.state.lock().resets
    }

    pub fn trigger_panic(&self) -> bool {
        self.state.lock().trigger_panic
    }

    pub fn remaining(&self) -> Option<Duration> {
        let s = self.state.lock();
        s.subscribed.then_some(s.countdown.remaining)
    }
}

impl TwdtPort for SimTwdt {
    fn reconfigure(&mut self, timeout_ms: u32, trigger_panic: bool) -> Result<(), PortError> {
        let mut s = self.state.lock();
        s.take_failure()?;
        s.timeout_ms = Some(timeout_ms);
        s.trigger_panic = trigger_panic;
        s.countdown
            .program(Duration::from_millis(u64::from(timeout_ms)));
        Ok(())
    }

    fn subscribe(&mut self) -> Result<(), PortError> {
        let mut s = self.state.lock();
        s.take_failure()?;
        if s.timeout_ms.is_none() {
            return Err(PortError(ESP_ERR_INVALID_STATE));
        }
        if !s.subscribed {
            s.subscribed = true;
            s.countdown.reload();
        }
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<(), PortError> {
        let mut s = self.state.lock();
        s.take_failure()?;
        if !s.subscribed {
            return Err(PortError(ESP_ERR_NOT_FOUND));
        }
        s.subscribed = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PortError> {
        let mut s = self.state.lock();
        s.take_failure()?;
        if !s.subscribed {
            return Err(PortError(ESP_ERR_NOT_FOUND));
        }
        s.countdown.reload();
        s.feeds += 1;
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    fn timeout_ms(&self) -> Option<u32> {
        self.state.lock().timeout_ms
    }

    fn attach_interrupt(&mut self, line: IrqLine) {
        self.state.lock().irq = Some(line);
    }
}
