//! Fuzz target: `SupervisorConfig` JSON loading
//!
//! cargo fuzz run fuzz_supervisor_config

#![no_main]

use libfuzzer_sys::fuzz_target;
use wdsup::config::SupervisorConfig;

fuzz_target!(|data: &[u8]| {
    // A config that loads must also pass validation.
    if let Ok(cfg) = SupervisorConfig::from_json(data) {
        assert!(cfg.validate().is_ok());
        assert!(cfg.app_timeout() < cfg.hw_timeout());
    }
});
