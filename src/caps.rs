//! Backend capability set.
//!
//! Each backend declares which optional control operations its hardware
//! supports. The facade and the backends check this set before touching
//! any register.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Optional behaviours of a concrete watchdog backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// No optional behaviour.
        const NONE = 0x00;
        /// Expiry can be configured to not hard-reset the device.
        const SOFT_RESET = 0x01;
        /// Expiry can raise an interrupt that reaches a user callback.
        const INTERRUPT = 0x02;
        /// The watchdog can be re-configured after it was configured or started.
        const RECONFIGURABLE = 0x04;
        /// The watchdog can be stopped after it was started.
        const STOPPABLE = 0x08;
        /// Every capability, including ones a future backend may define.
        const ALL = 0xFFFF_FFFF;
    }
}

impl Capabilities {
    /// `Ok(())` if every bit of `needed` is present, `NotSupported` otherwise.
    pub fn require(self, needed: Capabilities) -> Result<()> {
        if self.contains(needed) {
            Ok(())
        } else {
            Err(Error::NotSupported)
        }
    }
}
