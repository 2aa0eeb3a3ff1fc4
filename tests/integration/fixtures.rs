//! Registry fixtures over the simulated peripherals.
//!
//! Every fixture returns the facade handle plus the sim probe, so a test
//! can drive time forward and inspect what reached the "registers".

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use wdsup::adapters::sim::{SimNrfWdt, SimRtlWdg, SimTwdt};
use wdsup::drivers::Backend;
use wdsup::{Instance, Registry, Watchdog};

pub fn single(backend: Backend) -> (Arc<Registry>, Watchdog) {
    let registry = Arc::new(
        Registry::builder()
            .with(Instance::FIRST, backend)
            .unwrap()
            .build(),
    );
    let wdt = Watchdog::new(Arc::clone(&registry), Instance::FIRST).unwrap();
    (registry, wdt)
}

pub fn nrf52() -> (Watchdog, SimNrfWdt) {
    let sim = SimNrfWdt::new();
    let (_, wdt) = single(Backend::nrf52(sim.clone()));
    (wdt, sim)
}

pub fn rtl872x() -> (Watchdog, SimRtlWdg) {
    let sim = SimRtlWdg::new();
    let (_, wdt) = single(Backend::rtl872x(sim.clone()));
    (wdt, sim)
}

pub fn twdt() -> (Watchdog, SimTwdt) {
    let sim = SimTwdt::new();
    let (_, wdt) = single(Backend::twdt(sim.clone()));
    (wdt, sim)
}

/// Callback that counts its invocations.
pub fn counter() -> (Arc<AtomicU32>, impl Fn() + Send + Sync + 'static) {
    let hits = Arc::new(AtomicU32::new(0));
    let h = Arc::clone(&hits);
    (hits, move || {
        h.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn hits(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::SeqCst)
}
