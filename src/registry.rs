//! Instance registry and concurrency guard.
//!
//! The registry owns every hardware watchdog backend on the device. It is
//! built once at boot, shared behind an `Arc`, and never torn down.
//!
//! One [`ReentrantMutex`] serializes all instances. A thread that already
//! holds it (for instance inside [`Registry::locked`], or from an expiry
//! callback run while a facade call is in progress) re-enters without
//! blocking. Each backend additionally sits in a `RefCell`: a nested call
//! that would touch a backend whose operation is still on the stack gets
//! [`Error::InvalidState`] rather than an aliased `&mut`.
//!
//! That last rule is stricter than a bare recursive mutex. An expiry
//! callback delivered while the guard is merely held can refresh its own
//! instance. One delivered from inside a port call of that same instance
//! (the backend is mid-operation) cannot: its nested `refresh` returns
//! `InvalidState` and the outer operation completes normally.

use core::cell::RefCell;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::ReentrantMutex;

use crate::caps::Capabilities;
use crate::drivers::{Backend, WatchdogBackend};
use crate::error::{Error, Result};
use crate::irq::{ExpiryCallback, ExpiryTable, IrqLine};

/// Upper bound on hardware watchdog peripherals per device.
pub const MAX_INSTANCES: usize = 4;

/// Identifier of one hardware watchdog peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instance(u8);

impl Instance {
    pub const FIRST: Self = Self(0);

    /// `NotFound` unless `id < MAX_INSTANCES`.
    pub fn new(id: u8) -> Result<Self> {
        if usize::from(id) < MAX_INSTANCES {
            Ok(Self(id))
        } else {
            Err(Error::NotFound)
        }
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for Instance {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::new(id)
    }
}

struct Slot {
    instance: Instance,
    backend: RefCell<Backend>,
}

type Slots = heapless::Vec<Slot, MAX_INSTANCES>;

/// Process-wide table of watchdog backends.
pub struct Registry {
    slots: ReentrantMutex<Slots>,
    expiry: Arc<ExpiryTable>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Run `f` with the guard held. Facade calls made inside `f` from this
    /// thread re-enter the guard.
    pub fn locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.slots.lock();
        f()
    }

    /// Registered instances in registration order.
    pub fn instances(&self) -> heapless::Vec<Instance, MAX_INSTANCES> {
        self.slots.lock().iter().map(|slot| slot.instance).collect()
    }

    pub fn contains(&self, instance: Instance) -> bool {
        self.slots.lock().iter().any(|slot| slot.instance == instance)
    }

    /// Expiry notifications seen for `instance`, with or without a callback.
    pub fn expirations(&self, instance: Instance) -> u32 {
        self.expiry.expirations(instance.index())
    }

    /// Run `f` on the backend for `instance` under the guard.
    pub(crate) fn with_backend<R>(
        &self,
        instance: Instance,
        f: impl FnOnce(&mut Backend) -> Result<R>,
    ) -> Result<R> {
        let slots = self.slots.lock();
        let slot = find(&slots, instance)?;
        let mut backend = slot.backend.try_borrow_mut().map_err(|_| {
            warn!("wdt: instance {} busy in an outer call", instance.id());
            Error::InvalidState
        })?;
        f(&mut backend)
    }

    /// Read-only access to the backend for `instance` under the guard.
    pub(crate) fn inspect<R>(&self, instance: Instance, f: impl FnOnce(&Backend) -> R) -> Result<R> {
        let slots = self.slots.lock();
        let slot = find(&slots, instance)?;
        let backend = slot.backend.try_borrow().map_err(|_| Error::InvalidState)?;
        Ok(f(&backend))
    }

    /// Store the expiry callback for `instance`. Needs INTERRUPT; at most
    /// one callback per instance.
    pub(crate) fn register_callback(&self, instance: Instance, callback: ExpiryCallback) -> Result<()> {
        let slots = self.slots.lock();
        let slot = find(&slots, instance)?;
        let caps = slot
            .backend
            .try_borrow()
            .map_err(|_| Error::InvalidState)?
            .capabilities();
        caps.require(Capabilities::INTERRUPT)?;
        self.expiry.register(instance.index(), callback)?;
        debug!("wdt: expiry callback registered for instance {}", instance.id());
        Ok(())
    }
}

fn find(slots: &Slots, instance: Instance) -> Result<&Slot> {
    slots
        .iter()
        .find(|slot| slot.instance == instance)
        .ok_or(Error::NotFound)
}

/// Collects backends before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    backends: heapless::Vec<(Instance, Backend), MAX_INSTANCES>,
}

impl RegistryBuilder {
    /// Add `backend` as `instance`. `InvalidArgument` on a duplicate id.
    pub fn with(mut self, instance: Instance, backend: Backend) -> Result<Self> {
        if self.backends.iter().any(|(id, _)| *id == instance) {
            return Err(Error::InvalidArgument);
        }
        self.backends
            .push((instance, backend))
            .map_err(|_| Error::InvalidArgument)?;
        Ok(self)
    }

    /// Hand every backend its interrupt line and freeze the table.
    pub fn build(self) -> Registry {
        let expiry = Arc::new(ExpiryTable::default());
        let slots = self
            .backends
            .into_iter()
            .map(|(instance, mut backend)| {
                backend.bind_irq(IrqLine::new(Arc::clone(&expiry), instance.index()));
                debug!("wdt: instance {} -> {}", instance.id(), backend.name());
                Slot {
                    instance,
                    backend: RefCell::new(backend),
                }
            })
            .collect();
        Registry {
            slots: ReentrantMutex::new(slots),
            expiry,
        }
    }
}
