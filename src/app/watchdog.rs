//! Hardware watchdog facade.
//!
//! A [`Watchdog`] is a cheap handle (registry + instance id). Every method
//! takes the registry guard for the duration of one backend operation, so
//! handles can be cloned freely across threads.
//!
//! ```ignore
//! let wdt = Watchdog::new(Arc::clone(&registry), Instance::FIRST)?;
//! wdt.on_expired(|| log::error!("watchdog expired"))?;
//! wdt.init(&WatchdogConfig::new(Duration::from_secs(2)).hard_reset(false))?;
//! wdt.start()?;
//! loop {
//!     do_work();
//!     wdt.refresh()?;
//! }
//! ```

use core::time::Duration;
use std::sync::Arc;

use crate::drivers::WatchdogBackend;
use crate::error::{Error, Result};
use crate::registry::{Instance, Registry};
use crate::schema::{WatchdogConfig, WatchdogInfo, duration_to_ms_ceil};

#[derive(Clone)]
pub struct Watchdog {
    registry: Arc<Registry>,
    instance: Instance,
}

impl Watchdog {
    /// Handle for `instance`. `NotFound` if the registry has no such backend.
    pub fn new(registry: Arc<Registry>, instance: Instance) -> Result<Self> {
        if !registry.contains(instance) {
            return Err(Error::NotFound);
        }
        Ok(Self { registry, instance })
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn init(&self, config: &WatchdogConfig) -> Result<()> {
        self.registry.with_backend(self.instance, |b| b.init(config))
    }

    /// Re-run `init` with the last configuration and a new period.
    /// Before the first `init` the remaining fields take their defaults.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        let timeout_ms = duration_to_ms_ceil(timeout);
        self.registry.with_backend(self.instance, |b| {
            let config = WatchdogConfig {
                timeout_ms,
                ..b.config().unwrap_or_default()
            };
            b.init(&config)
        })
    }

    /// Start counting. A running watchdog is left untouched (not fed).
    pub fn start(&self) -> Result<()> {
        self.registry.with_backend(self.instance, |b| b.start())
    }

    pub fn stop(&self) -> Result<()> {
        self.registry.with_backend(self.instance, |b| b.stop())
    }

    pub fn refresh(&self) -> Result<()> {
        self.registry.with_backend(self.instance, |b| b.refresh())
    }

    /// Capabilities, bounds, effective timeout and the live running bit.
    pub fn info(&self) -> Result<WatchdogInfo> {
        self.registry.inspect(self.instance, |b| b.info())
    }

    /// Write the info record into `out`, honouring the size the caller
    /// declared in its first two bytes. Returns the bytes written.
    pub fn get_info(&self, out: &mut [u8]) -> Result<usize> {
        self.info()?.encode_into(out)
    }

    /// Live running bit; `false` if the instance cannot be queried.
    pub fn started(&self) -> bool {
        self.info().is_ok_and(|info| info.running)
    }

    /// Register the expiry callback. Runs in interrupt context on the
    /// device: it must not block, allocate or take locks.
    ///
    /// `NotSupported` without INTERRUPT, `InvalidState` if a callback is
    /// already registered.
    pub fn on_expired<F>(&self, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.registry
            .register_callback(self.instance, Box::new(callback))
    }

    /// Register a plain function with a context value passed by reference.
    pub fn on_expired_with<C>(&self, callback: fn(&C), context: C) -> Result<()>
    where
        C: Send + Sync + 'static,
    {
        self.on_expired(move || callback(&context))
    }

    /// Expiry notifications observed for this instance.
    pub fn expirations(&self) -> u32 {
        self.registry.expirations(self.instance)
    }
}

impl core::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Watchdog")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}
