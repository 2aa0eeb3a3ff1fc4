//! Concurrency guard: re-entry from expiry callbacks and cross-thread use.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use wdsup::adapters::sim::{SimRtlWdg, SimTwdt};
use wdsup::app::ports::NrfWdtPort;
use wdsup::drivers::Backend;
use wdsup::irq::IrqLine;
use wdsup::{Error, Result, WatchdogConfig};

use crate::fixtures;

fn interrupt_mode(ms: u64) -> WatchdogConfig {
    WatchdogConfig::new(Duration::from_millis(ms)).hard_reset(false)
}

#[test]
fn refresh_from_callback_under_held_guard() {
    let sim = SimRtlWdg::new();
    let (registry, wdt) = fixtures::single(Backend::rtl872x(sim.clone()));

    let seen: Arc<Mutex<Vec<Result<()>>>> = Arc::default();
    let (inner, log) = (wdt.clone(), Arc::clone(&seen));
    wdt.on_expired(move || {
        log.lock().unwrap().push(inner.refresh());
        assert!(inner.info().is_ok_and(|info| info.running));
    })
    .unwrap();
    wdt.init(&interrupt_mode(1_000)).unwrap();
    wdt.start().unwrap();

    // Expiry delivered while this thread already holds the guard.
    registry.locked(|| sim.expire());

    assert_eq!(*seen.lock().unwrap(), vec![Ok(())]);
    assert_eq!(sim.refreshes(), 1);
    assert_eq!(sim.remaining(), Some(Duration::from_secs(1)));
}

#[test]
fn nested_facade_calls_reenter() {
    let (registry, wdt) = fixtures::single(Backend::twdt(SimTwdt::new()));
    let info = registry.locked(|| {
        wdt.init(&WatchdogConfig::new(Duration::from_secs(1)))?;
        registry.locked(|| wdt.start())?;
        wdt.refresh()?;
        wdt.info()
    });
    assert!(info.unwrap().running);
}

#[test]
fn facade_is_usable_from_many_threads() {
    let (wdt, sim) = fixtures::rtl872x();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let wdt = wdt.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    wdt.refresh().unwrap();
                    assert!(wdt.started());
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(sim.refreshes(), 400);
}

// ── Expiry raised from inside a backend operation ─────────────

/// nRF52 port whose feed raises the TIMEOUT event synchronously, as if
/// the counter lapsed during the register write.
#[derive(Default)]
struct RacyFeedPort {
    crv: u32,
    running: bool,
    line: Option<IrqLine>,
}

impl NrfWdtPort for RacyFeedPort {
    fn set_reload_value(&mut self, crv: u32) {
        self.crv = crv;
    }

    fn reload_value(&self) -> u32 {
        self.crv
    }

    fn set_behaviour(&mut self, _run_in_sleep: bool, _run_in_halt: bool) {}

    fn enable_reload_channel(&mut self, _channel: u8) {}

    fn enable_timeout_interrupt(&mut self, line: IrqLine) {
        self.line = Some(line);
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn feed(&mut self, _channel: u8) {
        if let Some(line) = &self.line {
            line.fire();
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[test]
fn callback_cannot_alias_backend_mid_operation() {
    let (_registry, wdt) = fixtures::single(Backend::nrf52(RacyFeedPort::default()));
    let seen: Arc<Mutex<Vec<Result<()>>>> = Arc::default();
    let (inner, log) = (wdt.clone(), Arc::clone(&seen));
    wdt.on_expired(move || log.lock().unwrap().push(inner.refresh()))
        .unwrap();
    wdt.init(&interrupt_mode(100)).unwrap();
    wdt.start().unwrap();

    // Outer refresh completes; the nested one is refused, not deadlocked.
    assert_eq!(wdt.refresh(), Ok(()));
    assert_eq!(*seen.lock().unwrap(), vec![Err(Error::InvalidState)]);
}
