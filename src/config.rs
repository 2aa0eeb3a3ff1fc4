//! Supervision configuration.
//!
//! Parameters for bringing up both watchdog tiers at boot. Loaded from a
//! JSON blob (NVS or a provisioning message); any field left out keeps
//! its default.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::liveness::DisposePolicy;
use crate::registry::Instance;

/// Two-tier supervision settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    // --- Hardware tier ---
    /// Hardware watchdog instance to arm
    pub instance: u8,
    /// Hardware watchdog period (milliseconds)
    pub hw_timeout_ms: u32,
    /// Reset on expiry (`false`: interrupt path only, where supported)
    pub hard_reset: bool,

    // --- Software tier ---
    /// Liveness monitor timeout (milliseconds); must be below `hw_timeout_ms`
    pub app_timeout_ms: u32,
    /// Liveness monitor stack (bytes)
    pub app_stack_size: usize,
    /// Run the stall callback when the monitor is disposed
    pub dispose_policy: DisposePolicy,

    // --- Main loop ---
    /// How often the main loop feeds both tiers (milliseconds)
    pub feed_interval_ms: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            // Hardware
            instance: 0,
            hw_timeout_ms: 10_000, // 10 s
            hard_reset: true,

            // Software
            app_timeout_ms: 5_000,  // half the hardware period
            app_stack_size: 4_096,
            dispose_policy: DisposePolicy::Silent,

            // Main loop
            feed_interval_ms: 1_000, // 1 Hz
        }
    }
}

impl SupervisorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(raw).map_err(|e| {
            log::warn!("config: {e}");
            Error::InvalidArgument
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks. The hardware tier must be the slower one, and
    /// the main loop must feed well inside the software window.
    pub fn validate(&self) -> Result<()> {
        Instance::new(self.instance)?;
        if self.hw_timeout_ms == 0 || self.app_timeout_ms == 0 || self.feed_interval_ms == 0 {
            return Err(Error::InvalidArgument);
        }
        if self.app_timeout_ms >= self.hw_timeout_ms {
            return Err(Error::InvalidArgument);
        }
        if self.feed_interval_ms.saturating_mul(2) > self.app_timeout_ms {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    pub fn instance(&self) -> Result<Instance> {
        Instance::new(self.instance)
    }

    pub fn hw_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.hw_timeout_ms))
    }

    pub fn app_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.app_timeout_ms))
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.feed_interval_ms))
    }
}
