//! Interrupt-to-callback marshaling.
//!
//! Expiry notifications are produced by the watchdog peripheral's interrupt
//! handler and consumed by a user callback registered earlier from task
//! context.
//!
//! ```text
//! ┌──────────────┐  fire()  ┌─────────────────┐  get()  ┌──────────────┐
//! │ WDT ISR      │─────────▶│ ExpiryTable     │────────▶│ user         │
//! │ (holds line) │          │ [slot; N]       │         │ callback     │
//! └──────────────┘          │ (lock-free)     │         └──────────────┘
//!                           └─────────────────┘
//!                                  ▲ register(): task context, under guard
//! ```
//!
//! The interrupt path never allocates or locks. It indexes a fixed
//! table, bumps an atomic counter and performs one `OnceLock::get`.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::registry::MAX_INSTANCES;

/// Type-erased expiry callback. Context values are captured by the closure.
pub type ExpiryCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Per-instance callback storage, written at most once.
#[derive(Default)]
pub struct ExpirySlot {
    callback: OnceLock<ExpiryCallback>,
    expirations: AtomicU32,
}

impl ExpirySlot {
    /// Invoke the stored callback, if any. Safe in interrupt context.
    fn notify(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
        if let Some(cb) = self.callback.get() {
            cb();
        }
    }
}

/// Fixed table of expiry slots, indexed by instance id.
pub struct ExpiryTable {
    slots: [ExpirySlot; MAX_INSTANCES],
}

impl Default for ExpiryTable {
    fn default() -> Self {
        Self {
            slots: core::array::from_fn(|_| ExpirySlot::default()),
        }
    }
}

impl ExpiryTable {
    /// Store `callback` for `index`. A slot accepts exactly one callback.
    pub(crate) fn register(&self, index: usize, callback: ExpiryCallback) -> Result<()> {
        let slot = self.slots.get(index).ok_or(Error::NotFound)?;
        slot.callback.set(callback).map_err(|_| Error::InvalidState)
    }

    pub(crate) fn is_registered(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.callback.get().is_some())
    }

    pub(crate) fn expirations(&self, index: usize) -> u32 {
        self.slots
            .get(index)
            .map_or(0, |slot| slot.expirations.load(Ordering::Relaxed))
    }
}

/// Handle an interrupt handler uses to reach its instance's callback.
///
/// Handed to each backend when the registry is built; a backend attaches
/// it to its peripheral when the interrupt path is armed.
#[derive(Clone)]
pub struct IrqLine {
    table: Arc<ExpiryTable>,
    index: usize,
}

impl IrqLine {
    pub(crate) fn new(table: Arc<ExpiryTable>, index: usize) -> Self {
        Self { table, index }
    }

    /// Instance index this line notifies.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Expiry notification. Called from the watchdog interrupt handler.
    pub fn fire(&self) {
        if let Some(slot) = self.table.slots.get(self.index) {
            slot.notify();
        }
    }
}

impl core::fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IrqLine").field("index", &self.index).finish()
    }
}
