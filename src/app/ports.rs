//! Port traits: the boundary between the watchdog backends and the
//! vendor peripheral drivers.
//!
//! ```text
//!   Backend driver ──▶ Port trait ──▶ Adapter (vendor registers / sim)
//! ```
//!
//! Each hardware family gets one narrow programming interface. Backends
//! own the state machine, validation and unit conversion; adapters only
//! poke registers. On the host the [`sim`](crate::adapters::sim) adapters
//! implement these traits so the whole stack is testable without a board.
//!
//! ## Contract notes
//!
//! - Every method is a single short synchronous register access. No
//!   method may block or retry.
//! - Status reads (`is_running`, `is_enabled`, `is_subscribed`) must hit
//!   the hardware, never a cached copy: a watchdog can outlive a reset
//!   that does not power-cycle the peripheral.
//! - `*_interrupt` methods register the [`IrqLine`] with the vector table;
//!   the adapter's ISR calls [`IrqLine::fire`] and nothing else.

use core::fmt;

use crate::drivers::rtl872x::WdgDivider;
use crate::irq::IrqLine;

// ───────────────────────────────────────────────────────────────
// nRF52840 WDT
// ───────────────────────────────────────────────────────────────

/// Register interface of the nRF52840 WDT peripheral.
pub trait NrfWdtPort: Send {
    /// Write the CRV (counter reload value) register.
    fn set_reload_value(&mut self, crv: u32);

    /// Read back the CRV register.
    fn reload_value(&self) -> u32;

    /// Write CONFIG: keep counting while the CPU sleeps / is halted by a debugger.
    fn set_behaviour(&mut self, run_in_sleep: bool, run_in_halt: bool);

    /// Enable reload request register `channel` (RREN).
    fn enable_reload_channel(&mut self, channel: u8);

    /// Install the TIMEOUT vector and set INTENSET.TIMEOUT.
    fn enable_timeout_interrupt(&mut self, line: IrqLine);

    /// Whether the application may claim the WDT vector. Boards whose
    /// bootloader or radio stack owns it report `false`.
    fn timeout_vector_available(&self) -> bool {
        true
    }

    /// Trigger TASKS_START. The WDT cannot be stopped afterwards.
    fn start(&mut self);

    /// Write the reload magic to RR[`channel`].
    fn feed(&mut self, channel: u8);

    /// RUNSTATUS.
    fn is_running(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// RTL872x WDG
// ───────────────────────────────────────────────────────────────

/// Register interface of the Realtek RTL872x WDG peripheral.
pub trait RtlWdgPort: Send {
    /// Program the divider/count pair and the early-interrupt mode bit.
    fn configure(&mut self, divider: WdgDivider, early_interrupt: bool);

    /// Read back the programmed divider/count pair.
    fn divider(&self) -> WdgDivider;

    /// Install the WDG vector.
    fn attach_interrupt(&mut self, line: IrqLine);

    /// Set or clear the enable bit.
    fn set_enabled(&mut self, enabled: bool);

    /// Reload the counter.
    fn refresh(&mut self);

    /// Enable bit as read from the status register.
    fn is_enabled(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// ESP32 Task Watchdog Timer
// ───────────────────────────────────────────────────────────────

/// ESP-IDF task watchdog API as a port.
pub trait TwdtPort: Send {
    /// (Re)configure the TWDT. `trigger_panic = false` leaves expiry to the
    /// user interrupt hook.
    fn reconfigure(&mut self, timeout_ms: u32, trigger_panic: bool) -> Result<(), PortError>;

    /// Subscribe the calling task; the countdown starts.
    fn subscribe(&mut self) -> Result<(), PortError>;

    /// Unsubscribe the calling task; the countdown stops.
    fn unsubscribe(&mut self) -> Result<(), PortError>;

    /// Feed on behalf of the calling task.
    fn reset(&mut self) -> Result<(), PortError>;

    /// Whether the calling task is subscribed, as reported by ESP-IDF.
    fn is_subscribed(&self) -> bool;

    /// Period currently programmed, if the TWDT is initialised.
    fn timeout_ms(&self) -> Option<u32>;

    /// Route the TWDT user interrupt hook to `line`.
    fn attach_interrupt(&mut self, line: IrqLine);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Raw error code returned by a vendor API (`esp_err_t` on ESP-IDF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortError(pub i32);

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vendor error {}", self.0)
    }
}
