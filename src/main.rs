//! ESP32 supervision demo firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  main loop ── feed() every feed_interval_ms              │
//! │     │                                                    │
//! │     ├──▶ LivenessMonitor (appwdt thread, APP_CPU)        │
//! │     │        no checkin for app_timeout_ms → on_stall    │
//! │     │                                                    │
//! │     └──▶ Watchdog facade ── Registry ── TwdtWatchdog     │
//! │                                          │               │
//! │                                     EspTwdt (TWDT)       │
//! │                                  no feed → panic/reset   │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::{error, info, warn};

use wdsup::adapters::esp_twdt::EspTwdt;
use wdsup::boot::start_supervision;
use wdsup::config::SupervisorConfig;
use wdsup::drivers::Backend;
use wdsup::Registry;

/// Set from the TWDT interrupt, reported from the main loop.
static EXPIRED: AtomicBool = AtomicBool::new(false);

/// Optional JSON override baked in at build time.
const CONFIG_JSON: Option<&str> = option_env!("WDSUP_CONFIG_JSON");

fn load_config() -> SupervisorConfig {
    match CONFIG_JSON.map(|raw| SupervisorConfig::from_json(raw.as_bytes())) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            warn!("WDSUP_CONFIG_JSON rejected ({}), using defaults", e);
            SupervisorConfig::default()
        }
        None => SupervisorConfig::default(),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("wdsup v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config();
    let instance = config.instance()?;

    // ── 3. Hardware registry ──────────────────────────────────
    let registry = Registry::builder()
        .with(instance, Backend::twdt(EspTwdt::new()))
        .context("registry")?
        .build();
    let registry = Arc::new(registry);

    // ── 4. Both tiers ─────────────────────────────────────────
    let supervision = start_supervision(Arc::clone(&registry), &config, || {
        error!("liveness: main loop stalled, restarting");
        // SAFETY: esp_restart never returns and has no preconditions.
        unsafe { esp_idf_svc::sys::esp_restart() };
    })?;
    if !config.hard_reset {
        supervision
            .watchdog()
            .on_expired(|| EXPIRED.store(true, Ordering::Relaxed))
            .context("expiry callback")?;
    }

    // ── 5. Main loop ──────────────────────────────────────────
    info!("Supervision armed. Entering main loop.");
    loop {
        std::thread::sleep(config.feed_interval());
        if EXPIRED.swap(false, Ordering::Relaxed) {
            warn!(
                "twdt: expired ({} total), main loop was late",
                supervision.watchdog().expirations()
            );
        }
        if let Err(e) = supervision.feed() {
            error!("feed failed: {:#}", e);
        }
    }
}
