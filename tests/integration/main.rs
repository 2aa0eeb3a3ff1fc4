//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one tier of the
//! supervision stack against the simulated peripherals. All tests run on
//! the host (x86_64) with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod fixtures;
mod hw_watchdog_tests;
mod liveness_tests;
mod reentrancy_tests;
