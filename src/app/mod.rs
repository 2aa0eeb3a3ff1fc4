//! Application-facing layer.
//!
//! The [`watchdog`] facade is what firmware code calls. Backends reach
//! their peripherals only through the **port traits** in [`ports`], so
//! everything above them runs unchanged against the host simulations.

pub mod ports;
pub mod watchdog;
