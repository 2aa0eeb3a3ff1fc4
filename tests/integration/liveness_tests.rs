//! Software tier: checkin protocol and stall detection on real time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use wdsup::{DisposePolicy, LivenessMonitor, MonitorState};

type FiredAt = Arc<Mutex<Option<Duration>>>;

/// Counts callback runs and records when the last one happened, relative
/// to `epoch`.
fn recorder(epoch: Instant) -> (Arc<AtomicU32>, FiredAt, impl FnOnce() + Send + 'static) {
    let hits = Arc::new(AtomicU32::new(0));
    let at: FiredAt = Arc::default();
    let (h, a) = (Arc::clone(&hits), Arc::clone(&at));
    (hits, at, move || {
        h.fetch_add(1, Ordering::SeqCst);
        *a.lock().unwrap() = Some(epoch.elapsed());
    })
}

#[test]
fn steady_checkins_never_fire() {
    let (hits, _, cb) = recorder(Instant::now());
    let monitor = LivenessMonitor::new(Duration::from_millis(100), cb, 4096).unwrap();
    for _ in 0..10 {
        thread::sleep(Duration::from_millis(50));
        monitor.checkin();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!monitor.is_complete());
    assert_eq!(monitor.state(), MonitorState::Running);
}

#[test]
fn stalled_checkins_fire_once_within_window() {
    let epoch = Instant::now();
    let (hits, at, cb) = recorder(epoch);
    let monitor = LivenessMonitor::new(Duration::from_millis(100), cb, 4096).unwrap();

    let mut last_checkin = Duration::ZERO;
    for _ in 0..4 {
        thread::sleep(Duration::from_millis(50));
        last_checkin = epoch.elapsed();
        monitor.checkin();
    }

    thread::sleep(Duration::from_millis(300));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(monitor.is_complete());
    assert_eq!(monitor.state(), MonitorState::Fired);

    let fired = at.lock().unwrap().unwrap() - last_checkin;
    assert!(fired >= Duration::from_millis(100), "fired early: {fired:?}");
    assert!(fired < Duration::from_millis(150), "fired late: {fired:?}");

    // Resumed checkins do not revive the monitor.
    monitor.checkin();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn never_fires_before_full_timeout() {
    let timeout = Duration::from_millis(20);
    let monitors: Vec<_> = (0..40u64)
        .map(|i| {
            // Spread checkins across sub-millisecond offsets.
            thread::sleep(Duration::from_micros(137 * (i % 7)));
            let epoch = Instant::now();
            let (hits, at, cb) = recorder(epoch);
            let monitor = LivenessMonitor::new(timeout, cb, 4096).unwrap();
            (monitor, hits, at)
        })
        .collect();

    thread::sleep(Duration::from_millis(200));
    for (monitor, hits, at) in &monitors {
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.state(), MonitorState::Fired);
        let fired = at.lock().unwrap().unwrap();
        assert!(fired >= timeout, "fired early: {fired:?}");
    }
}

#[test]
fn worker_thread_checkins_keep_monitor_alive() {
    let (hits, _, cb) = recorder(Instant::now());
    let monitor = LivenessMonitor::new(Duration::from_millis(100), cb, 4096).unwrap();
    let handle = monitor.checkin_handle();
    let worker = thread::spawn(move || {
        for _ in 0..8 {
            thread::sleep(Duration::from_millis(40));
            handle.checkin();
        }
    });
    worker.join().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn dispose_policies() {
    let (silent, _, cb) = recorder(Instant::now());
    let monitor = LivenessMonitor::builder(Duration::from_secs(5))
        .dispose_policy(DisposePolicy::Silent)
        .spawn(cb)
        .unwrap();
    monitor.dispose();
    thread::sleep(Duration::from_millis(50));
    assert!(monitor.is_complete());
    assert_eq!(monitor.state(), MonitorState::Disposed);
    assert_eq!(silent.load(Ordering::SeqCst), 0);

    let (fire, _, cb) = recorder(Instant::now());
    let monitor = LivenessMonitor::builder(Duration::from_secs(5))
        .dispose_policy(DisposePolicy::Fire)
        .spawn(cb)
        .unwrap();
    drop(monitor);
    assert_eq!(fire.load(Ordering::SeqCst), 1);
}

#[test]
fn dispose_after_fire_does_not_repeat_callback() {
    let (hits, _, cb) = recorder(Instant::now());
    let monitor = LivenessMonitor::builder(Duration::from_millis(20))
        .dispose_policy(DisposePolicy::Fire)
        .spawn(cb)
        .unwrap();
    thread::sleep(Duration::from_millis(120));
    monitor.dispose();
    drop(monitor);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn process_wide_checkin_reaches_registered_monitor() {
    let (hits, _, cb) = recorder(Instant::now());
    let monitor = LivenessMonitor::builder(Duration::from_millis(100))
        .process_wide()
        .spawn(cb)
        .unwrap();
    for _ in 0..6 {
        thread::sleep(Duration::from_millis(40));
        assert!(wdsup::liveness::checkin());
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    drop(monitor);
    assert!(!wdsup::liveness::checkin(), "unregistered on dispose");
}
