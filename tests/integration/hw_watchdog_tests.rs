//! Hardware tier: facade → registry → backend → simulated peripheral.

use std::time::Duration;

use wdsup::adapters::sim::{SimNrfWdt, SimTwdt};
use wdsup::drivers::Backend;
use wdsup::{Capabilities, Error, WatchdogConfig};

use crate::fixtures::{self, counter, hits};

// ── Scenario A: hard reset after a missed refresh ─────────────

#[test]
fn scenario_a_nrf52_resets_after_timeout() {
    let (wdt, sim) = fixtures::nrf52();
    assert_eq!(
        wdt.init(&WatchdogConfig::new(Duration::from_millis(5_000)).hard_reset(true)),
        Ok(())
    );
    assert_eq!(wdt.start(), Ok(()));
    assert!(wdt.started());

    sim.advance(Duration::from_millis(4_999));
    assert_eq!(sim.resets(), 0);
    sim.advance(Duration::from_millis(1));
    assert_eq!(sim.resets(), 1, "device must reboot once the period lapses");
}

#[test]
fn scenario_a_twdt_panics_after_timeout() {
    let (wdt, sim) = fixtures::twdt();
    wdt.init(&WatchdogConfig::new(Duration::from_millis(5_000))).unwrap();
    wdt.start().unwrap();
    assert!(sim.trigger_panic());

    sim.advance(Duration::from_millis(5_000));
    assert_eq!(sim.resets(), 1);
}

#[test]
fn refresh_keeps_device_alive() {
    let (wdt, sim) = fixtures::rtl872x();
    wdt.init(&WatchdogConfig::new(Duration::from_millis(1_000))).unwrap();
    wdt.start().unwrap();
    for _ in 0..10 {
        sim.advance(Duration::from_millis(900));
        wdt.refresh().unwrap();
    }
    assert_eq!(sim.resets(), 0);
    assert_eq!(sim.refreshes(), 10);
}

// ── Scenario B: interrupt before any uncontrolled reset ───────

#[test]
fn scenario_b_rtl872x_callback_precedes_reset() {
    let (wdt, sim) = fixtures::rtl872x();
    let (count, cb) = counter();
    wdt.on_expired(cb).unwrap();
    wdt.init(&WatchdogConfig::new(Duration::from_millis(2_000)).hard_reset(false))
        .unwrap();
    wdt.start().unwrap();
    assert!(sim.early_interrupt());

    sim.advance(Duration::from_millis(2_000));
    assert_eq!(hits(&count), 1);
    assert_eq!(sim.resets(), 0, "first expiry only interrupts");

    sim.advance(Duration::from_millis(2_000));
    assert_eq!(sim.resets(), 1);
    assert_eq!(hits(&count), 1);
}

#[test]
fn scenario_b_rtl872x_refresh_after_interrupt_rearms_early_stage() {
    let (wdt, sim) = fixtures::rtl872x();
    let (count, cb) = counter();
    wdt.on_expired(cb).unwrap();
    wdt.init(&WatchdogConfig::new(Duration::from_millis(2_000)).hard_reset(false))
        .unwrap();
    wdt.start().unwrap();

    sim.advance(Duration::from_millis(2_000));
    wdt.refresh().unwrap();
    sim.advance(Duration::from_millis(2_000));
    assert_eq!(hits(&count), 2);
    assert_eq!(sim.resets(), 0);
}

#[test]
fn scenario_b_nrf52_callback_runs_ahead_of_reset() {
    let (wdt, sim) = fixtures::nrf52();
    let (count, cb) = counter();
    wdt.on_expired(cb).unwrap();
    wdt.init(&WatchdogConfig::new(Duration::from_millis(2_000)).hard_reset(false))
        .unwrap();
    wdt.start().unwrap();
    assert!(sim.interrupt_enabled());

    sim.advance(Duration::from_millis(2_000));
    assert_eq!(hits(&count), 1);
    assert_eq!(sim.resets(), 1);
    assert_eq!(wdt.expirations(), 1);
}

#[test]
fn scenario_b_twdt_soft_reset_only_interrupts() {
    let (wdt, sim) = fixtures::twdt();
    let (count, cb) = counter();
    wdt.on_expired(cb).unwrap();
    wdt.init(&WatchdogConfig::new(Duration::from_millis(2_000)).hard_reset(false))
        .unwrap();
    wdt.start().unwrap();

    sim.advance(Duration::from_millis(6_000));
    assert_eq!(hits(&count), 3);
    assert_eq!(sim.resets(), 0);
    assert!(wdt.started());
}

// ── State machine errors ──────────────────────────────────────

#[test]
fn refresh_before_init_never_touches_hardware() {
    let (wdt, sim) = fixtures::nrf52();
    assert_eq!(wdt.refresh(), Err(Error::InvalidState));
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    assert_eq!(wdt.refresh(), Err(Error::InvalidState));
    assert_eq!(sim.feeds(), 0);
}

#[test]
fn stop_on_nrf52_is_not_supported_and_keeps_running() {
    let (wdt, _sim) = fixtures::nrf52();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    assert_eq!(wdt.stop(), Err(Error::NotSupported));
    assert!(wdt.started());
}

#[test]
fn nrf52_cannot_be_reconfigured() {
    let (wdt, sim) = fixtures::nrf52();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    assert_eq!(
        wdt.init(&WatchdogConfig::new(Duration::from_secs(2))),
        Err(Error::InvalidState)
    );
    assert_eq!(sim.crv(), 32_767);
    assert_eq!(wdt.set_timeout(Duration::from_secs(2)), Err(Error::InvalidState));
}

#[test]
fn nrf52_programs_behaviour() {
    let (wdt, sim) = fixtures::nrf52();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    assert_eq!(sim.behaviour(), (true, false));
    assert!(!sim.interrupt_enabled());
}

#[test]
fn stop_is_idempotent_on_rtl872x() {
    let (wdt, sim) = fixtures::rtl872x();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    assert_eq!(wdt.stop(), Ok(()));
    assert_eq!(wdt.stop(), Ok(()));
    assert!(!wdt.started());
    assert_eq!(wdt.refresh(), Err(Error::InvalidState));

    sim.advance(Duration::from_secs(10));
    assert_eq!(sim.resets(), 0);

    wdt.start().unwrap();
    assert!(wdt.started());
}

#[test]
fn reconfigure_while_running_restarts_countdown() {
    let (wdt, sim) = fixtures::rtl872x();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    sim.advance(Duration::from_millis(800));

    wdt.init(&WatchdogConfig::new(Duration::from_secs(2))).unwrap();
    assert!(wdt.started());
    assert_eq!(sim.remaining(), Some(Duration::from_secs(2)));
    assert_eq!(wdt.info().unwrap().timeout_ms, 2_000);

    sim.advance(Duration::from_millis(1_500));
    assert_eq!(sim.resets(), 0);
}

#[test]
fn twdt_reconfigure_while_running_feeds() {
    let (wdt, sim) = fixtures::twdt();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    sim.advance(Duration::from_millis(900));
    wdt.set_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(sim.remaining(), Some(Duration::from_secs(3)));
    assert!(sim.trigger_panic(), "mode carried over from the first init");
}

#[test]
fn start_readback_mismatch_is_internal() {
    let sim = SimNrfWdt::new();
    let (_, wdt) = fixtures::single(Backend::nrf52(sim.clone()));
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    sim.ignore_start(true);
    assert_eq!(wdt.start(), Err(Error::Internal));
    assert!(!wdt.started());
    assert_eq!(wdt.refresh(), Err(Error::InvalidState), "state unchanged");

    sim.ignore_start(false);
    assert_eq!(wdt.start(), Ok(()));
}

#[test]
fn stuck_enable_bit_is_internal() {
    let (wdt, sim) = fixtures::rtl872x();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    sim.stick_enable(true);
    assert_eq!(wdt.stop(), Err(Error::Internal));
    assert!(wdt.started());
}

#[test]
fn failed_live_reconfigure_keeps_old_period_running() {
    let (wdt, sim) = fixtures::rtl872x();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    sim.advance(Duration::from_millis(600));

    sim.lock_divider(true);
    assert_eq!(
        wdt.init(&WatchdogConfig::new(Duration::from_secs(2))),
        Err(Error::Internal)
    );
    assert!(wdt.started(), "counter re-enabled after the failed write");
    assert_eq!(sim.remaining(), Some(Duration::from_secs(1)));
    assert_eq!(wdt.info().unwrap().timeout_ms, 1_000);

    let fed = sim.refreshes();
    assert_eq!(wdt.refresh(), Ok(()));
    assert_eq!(sim.refreshes(), fed + 1);
    sim.advance(Duration::from_millis(900));
    assert_eq!(sim.resets(), 0);
}

#[test]
fn twdt_failed_feed_after_reconfigure_reports_new_period() {
    let (wdt, sim) = fixtures::twdt();
    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();

    // reconfigure lands, the follow-up feed fails.
    sim.fail_after(1, -1);
    assert_eq!(wdt.set_timeout(Duration::from_secs(3)), Err(Error::Internal));
    assert_eq!(wdt.info().unwrap().timeout_ms, 3_000);
    assert!(wdt.started());
    assert_eq!(wdt.refresh(), Ok(()));
    assert_eq!(sim.remaining(), Some(Duration::from_secs(3)));
}

#[test]
fn twdt_vendor_error_is_internal() {
    let (wdt, sim) = fixtures::twdt();
    sim.fail_next(-1);
    assert_eq!(
        wdt.init(&WatchdogConfig::new(Duration::from_secs(1))),
        Err(Error::Internal)
    );
    assert!(wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).is_ok());
}

// ── Bounds and capabilities ───────────────────────────────────

#[test]
fn out_of_bounds_timeouts_are_invalid_argument() {
    let (wdt, _sim) = fixtures::nrf52();
    let info = wdt.info().unwrap();
    let too_long = WatchdogConfig {
        timeout_ms: info.max_timeout_ms + 1,
        ..WatchdogConfig::default()
    };
    assert_eq!(wdt.init(&too_long), Err(Error::InvalidArgument));
    let zero = WatchdogConfig {
        timeout_ms: 0,
        ..WatchdogConfig::default()
    };
    assert_eq!(wdt.init(&zero), Err(Error::InvalidArgument));

    // Failed init leaves the backend uninitialised.
    assert_eq!(wdt.start(), Err(Error::InvalidState));
}

#[test]
fn bounds_are_reported_per_family() {
    let (nrf, _) = fixtures::nrf52();
    let (rtl, _) = fixtures::rtl872x();
    let (twdt, _) = fixtures::twdt();

    let i = nrf.info().unwrap();
    assert_eq!((i.min_timeout_ms, i.max_timeout_ms), (1, 131_072_000));
    assert_eq!(i.capabilities, Capabilities::INTERRUPT);

    let i = rtl.info().unwrap();
    assert_eq!((i.min_timeout_ms, i.max_timeout_ms), (1, 8_190_000));
    assert!(i.capabilities.contains(Capabilities::STOPPABLE | Capabilities::RECONFIGURABLE));

    let i = twdt.info().unwrap();
    assert_eq!((i.min_timeout_ms, i.max_timeout_ms), (1, u32::MAX / 1_000));
    assert!(i.capabilities.contains(Capabilities::SOFT_RESET));
}

#[test]
fn callback_without_interrupt_capability_is_never_invoked() {
    let sim = SimNrfWdt::without_interrupt();
    let (_, wdt) = fixtures::single(Backend::nrf52(sim.clone()));
    assert_eq!(wdt.info().unwrap().capabilities, Capabilities::NONE);

    let (count, cb) = counter();
    assert_eq!(wdt.on_expired(cb), Err(Error::NotSupported));
    assert_eq!(
        wdt.init(&WatchdogConfig::new(Duration::from_secs(1)).hard_reset(false)),
        Err(Error::NotSupported)
    );

    wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
    wdt.start().unwrap();
    sim.advance(Duration::from_secs(5));
    assert_eq!(sim.resets(), 5);
    assert_eq!(hits(&count), 0);
}

#[test]
fn second_callback_is_rejected_and_first_kept() {
    let (wdt, sim) = fixtures::rtl872x();
    let (first, cb1) = counter();
    let (second, cb2) = counter();
    wdt.on_expired(cb1).unwrap();
    assert_eq!(wdt.on_expired(cb2), Err(Error::InvalidState));

    wdt.init(&WatchdogConfig::new(Duration::from_millis(100)).hard_reset(false))
        .unwrap();
    wdt.start().unwrap();
    sim.expire();
    assert_eq!((hits(&first), hits(&second)), (1, 0));
}

// ── Live running bit ──────────────────────────────────────────

#[test]
fn running_bit_survives_reset_without_power_cycle() {
    let sim = SimNrfWdt::new();
    {
        let (_, wdt) = fixtures::single(Backend::nrf52(sim.clone()));
        wdt.init(&WatchdogConfig::new(Duration::from_secs(1))).unwrap();
        wdt.start().unwrap();
    }
    sim.advance(Duration::from_secs(1));
    assert_eq!(sim.resets(), 1);

    // Firmware restarts; the peripheral never stopped.
    let (_, wdt) = fixtures::single(Backend::nrf52(sim.clone()));
    let info = wdt.info().unwrap();
    assert!(info.running);
    assert_eq!(info.timeout_ms, 1_000);
    assert_eq!(wdt.refresh(), Ok(()), "adopted watchdog can be fed");

    sim.power_cycle();
    assert!(!wdt.info().unwrap().running);
    assert!(!wdt.started());
}

#[test]
fn twdt_subscription_after_panic_reset_reads_stopped() {
    let sim = SimTwdt::new();
    let (_, wdt) = fixtures::single(Backend::twdt(sim.clone()));
    wdt.init(&WatchdogConfig::new(Duration::from_millis(500))).unwrap();
    wdt.start().unwrap();
    sim.expire();
    assert!(!wdt.started());
    assert!(!wdt.info().unwrap().running);
}
