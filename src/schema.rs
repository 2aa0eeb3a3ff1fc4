//! Versioned config and info records.
//!
//! Both records start with a `{size: u16, version: u16}` header so that a
//! firmware upgrade that appends fields stays binary compatible. A reader
//! copies only `min(declared_size, own_size)` bytes and leaves everything
//! past that at its default value.
//!
//! ```text
//! WatchdogConfig (12 bytes, little-endian)
//!   0      2        4            8           9
//!   ├─size─┼─version─┼─timeout_ms─┼─hard_reset─┼─reserved[3]─┤
//!
//! WatchdogInfo (24 bytes, little-endian)
//!   0      2        4      8         12    16    20        21
//!   ├─size─┼─version─┼─caps─┼─timeout─┼─min─┼─max─┼─running─┼─reserved[3]─┤
//! ```

use core::time::Duration;

use crate::caps::Capabilities;
use crate::error::{Error, Result};

/// Length of the `{size, version}` header shared by both records.
pub const HEADER_LEN: usize = 4;

/// Current [`WatchdogConfig`] layout version.
pub const CONFIG_VERSION: u16 = 1;
/// Encoded length of the current [`WatchdogConfig`] layout.
pub const CONFIG_LEN: usize = 12;

/// Current [`WatchdogInfo`] layout version.
pub const INFO_VERSION: u16 = 1;
/// Encoded length of the current [`WatchdogInfo`] layout.
pub const INFO_LEN: usize = 24;

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

/// Configuration passed to a single `init` call.
///
/// Backends copy the fields they recognise and do not keep a reference
/// to the caller's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Encoded size of the record as declared by its producer.
    pub size: u16,
    /// Layout version as declared by its producer.
    pub version: u16,
    /// Requested expiry period in milliseconds.
    pub timeout_ms: u32,
    /// `true`: expiry resets the device. `false`: expiry raises the
    /// interrupt path (requires [`Capabilities::INTERRUPT`]).
    pub hard_reset: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            size: CONFIG_LEN as u16,
            version: CONFIG_VERSION,
            timeout_ms: 10_000,
            hard_reset: true,
        }
    }
}

impl WatchdogConfig {
    /// Config with the given timeout and a hard reset on expiry.
    ///
    /// Sub-millisecond remainders round up, never down.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: duration_to_ms_ceil(timeout),
            ..Self::default()
        }
    }

    /// Select hard reset (`true`) or the interrupt path (`false`).
    #[must_use]
    pub fn hard_reset(mut self, hard_reset: bool) -> Self {
        self.hard_reset = hard_reset;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Structural validation. Range checks against hardware bounds happen
    /// in the backend.
    pub fn validate(&self) -> Result<()> {
        if usize::from(self.size) < HEADER_LEN || self.version == 0 || self.timeout_ms == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; CONFIG_LEN] {
        let mut raw = [0u8; CONFIG_LEN];
        raw[0..2].copy_from_slice(&self.size.to_le_bytes());
        raw[2..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..8].copy_from_slice(&self.timeout_ms.to_le_bytes());
        raw[8] = u8::from(self.hard_reset);
        raw
    }

    /// Decode a record produced by any layout version.
    ///
    /// Trailing fields unknown to this build are ignored; fields the
    /// producer did not know about keep their defaults.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut raw = Self::default().to_bytes();
        overlay(buf, &mut raw)?;
        Ok(Self {
            size: CONFIG_LEN as u16,
            version: u16_at(&raw, 2),
            timeout_ms: u32_at(&raw, 4),
            hard_reset: raw[8] != 0,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Info
// ═══════════════════════════════════════════════════════════════

/// Snapshot of a backend's capabilities, bounds and live status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogInfo {
    pub size: u16,
    pub version: u16,
    pub capabilities: Capabilities,
    /// Effective period currently programmed (0 if never configured).
    pub timeout_ms: u32,
    pub min_timeout_ms: u32,
    pub max_timeout_ms: u32,
    /// Read from the hardware status register on every query.
    pub running: bool,
}

impl Default for WatchdogInfo {
    fn default() -> Self {
        Self {
            size: INFO_LEN as u16,
            version: INFO_VERSION,
            capabilities: Capabilities::NONE,
            timeout_ms: 0,
            min_timeout_ms: 0,
            max_timeout_ms: 0,
            running: false,
        }
    }
}

impl WatchdogInfo {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.min_timeout_ms))
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_timeout_ms))
    }

    pub fn to_bytes(&self) -> [u8; INFO_LEN] {
        let mut raw = [0u8; INFO_LEN];
        raw[0..2].copy_from_slice(&self.size.to_le_bytes());
        raw[2..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..8].copy_from_slice(&self.capabilities.bits().to_le_bytes());
        raw[8..12].copy_from_slice(&self.timeout_ms.to_le_bytes());
        raw[12..16].copy_from_slice(&self.min_timeout_ms.to_le_bytes());
        raw[16..20].copy_from_slice(&self.max_timeout_ms.to_le_bytes());
        raw[20] = u8::from(self.running);
        raw
    }

    /// Fill a caller-owned record whose header declares its size.
    ///
    /// The caller's `size` is preserved, `version` is overwritten with
    /// ours, and only `min(declared, INFO_LEN)` bytes are written.
    /// Returns the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize> {
        let declared = declared_size(out)?;
        let n = declared.min(INFO_LEN);
        let raw = self.to_bytes();
        out[2..n].copy_from_slice(&raw[2..n]);
        Ok(n)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut raw = Self::default().to_bytes();
        overlay(buf, &mut raw)?;
        Ok(Self {
            size: INFO_LEN as u16,
            version: u16_at(&raw, 2),
            capabilities: Capabilities::from_bits_retain(u32_at(&raw, 4)),
            timeout_ms: u32_at(&raw, 8),
            min_timeout_ms: u32_at(&raw, 12),
            max_timeout_ms: u32_at(&raw, 16),
            running: raw[20] != 0,
        })
    }
}

// ── Internal ──────────────────────────────────────────────────

/// Size declared by a record header, checked against the buffer.
fn declared_size(buf: &[u8]) -> Result<usize> {
    let header: [u8; 2] = buf
        .get(0..2)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::InvalidArgument)?;
    let declared = usize::from(u16::from_le_bytes(header));
    if declared < HEADER_LEN || declared > buf.len() {
        return Err(Error::InvalidArgument);
    }
    Ok(declared)
}

/// Copy `min(declared, own)` bytes of `src` over the defaults in `dst`.
fn overlay<const N: usize>(src: &[u8], dst: &mut [u8; N]) -> Result<()> {
    let n = declared_size(src)?.min(N);
    dst[..n].copy_from_slice(&src[..n]);
    Ok(())
}

fn u16_at<const N: usize>(raw: &[u8; N], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn u32_at<const N: usize>(raw: &[u8; N], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

/// Whole milliseconds covering `d`, saturating at `u32::MAX`.
pub(crate) fn duration_to_ms_ceil(d: Duration) -> u32 {
    let mut ms = d.as_millis();
    if d.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    u32::try_from(ms).unwrap_or(u32::MAX)
}
