//! Error taxonomy for the watchdog subsystem.
//!
//! A single small `Copy` enum returned synchronously by every facade and
//! backend operation. `Ok(())` plays the role of the "none" status. No
//! variant is ever used as a control-flow signal and nothing at this layer
//! retries: a caller that needs resilience resubmits the operation.

use core::fmt;

/// Every fallible watchdog operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed config header, zero timeout, or timeout outside `[min, max]`.
    InvalidArgument,
    /// Operation illegal in the current state (refresh before start,
    /// re-init of non-reconfigurable hardware, duplicate callback).
    InvalidState,
    /// The backend lacks the capability the operation needs.
    NotSupported,
    /// Unknown or unregistered instance identifier.
    NotFound,
    /// Hardware readback disagrees with the requested state.
    Internal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::NotSupported => write!(f, "not supported"),
            Self::NotFound => write!(f, "not found"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl core::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
