//! Two-tier watchdog supervision.
//!
//! - **Hardware tier**: [`Registry`] of [`drivers::Backend`]s behind one
//!   reentrant guard, driven through the [`Watchdog`] facade.
//! - **Software tier**: [`LivenessMonitor`], a checkin-driven stall
//!   detector on its own thread.
//!
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`;
//! on the host the [`adapters::sim`] peripherals stand in for hardware.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod boot;
pub mod caps;
pub mod config;
pub mod drivers;
pub mod irq;
pub mod liveness;
pub mod registry;
pub mod schema;

mod error;
mod esp_link_shims;

pub use app::watchdog::Watchdog;
pub use caps::Capabilities;
pub use error::{Error, Result};
pub use liveness::{Checkin, DisposePolicy, LivenessMonitor, MonitorState};
pub use registry::{Instance, MAX_INSTANCES, Registry};
pub use schema::{WatchdogConfig, WatchdogInfo};
