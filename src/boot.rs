//! Boot-time bring-up of both supervision tiers.
//!
//! Arms the hardware watchdog from a [`SupervisorConfig`], then starts the
//! liveness monitor. The returned [`Supervision`] is what the main loop
//! feeds on every iteration.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::app::watchdog::Watchdog;
use crate::config::SupervisorConfig;
use crate::error::Error;
use crate::liveness::{Checkin, LivenessMonitor};
use crate::registry::Registry;
use crate::schema::WatchdogConfig;

/// Both tiers, armed.
pub struct Supervision {
    watchdog: Watchdog,
    monitor: LivenessMonitor,
}

impl Supervision {
    /// Check in with the liveness monitor and refresh the hardware watchdog.
    pub fn feed(&self) -> Result<()> {
        self.monitor.checkin();
        self.watchdog
            .refresh()
            .context("hardware watchdog refresh")
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }

    /// Checkin handle for worker threads.
    pub fn checkin_handle(&self) -> Checkin {
        self.monitor.checkin_handle()
    }
}

/// Arm the hardware watchdog and start the liveness monitor.
///
/// A hardware watchdog still running from before the last reset is kept:
/// if it cannot be reprogrammed it keeps its old period.
pub fn start_supervision(
    registry: Arc<Registry>,
    config: &SupervisorConfig,
    on_stall: impl FnOnce() + Send + 'static,
) -> Result<Supervision> {
    config.validate().context("invalid supervisor config")?;
    let instance = config.instance()?;
    let watchdog = Watchdog::new(registry, instance)
        .with_context(|| format!("watchdog instance {} not registered", instance.id()))?;

    let before = watchdog.info().context("hardware watchdog info")?;
    let hw = WatchdogConfig::new(config.hw_timeout()).hard_reset(config.hard_reset);
    match watchdog.init(&hw) {
        Err(Error::InvalidState) if before.running => warn!(
            "boot: hardware watchdog running since before reset, keeping {} ms",
            before.timeout_ms
        ),
        other => other.context("hardware watchdog init")?,
    }
    watchdog.start().context("hardware watchdog start")?;

    let monitor = LivenessMonitor::builder(config.app_timeout())
        .stack_size(config.app_stack_size)
        .dispose_policy(config.dispose_policy)
        .spawn(on_stall)
        .context("liveness monitor")?;

    info!(
        "boot: supervision up (hw {} ms, app {} ms)",
        config.hw_timeout_ms, config.app_timeout_ms
    );
    Ok(Supervision { watchdog, monitor })
}
