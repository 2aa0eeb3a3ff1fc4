//! Fuzz target: versioned `WatchdogConfig` / `WatchdogInfo` records
//!
//! Feeds arbitrary bytes to both decoders and to `encode_into`, checking:
//! - No panics on any input
//! - Decoded records always report this build's own size
//! - `encode_into` never writes past the caller's declared size and
//!   never rewrites the size field
//!
//! cargo fuzz run fuzz_record_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use wdsup::schema::{CONFIG_LEN, INFO_LEN};
use wdsup::{WatchdogConfig, WatchdogInfo};

fuzz_target!(|data: &[u8]| {
    if let Ok(cfg) = WatchdogConfig::from_bytes(data) {
        assert_eq!(usize::from(cfg.size), CONFIG_LEN);
        // Validation is total as well.
        let _ = cfg.validate();
    }

    let decoded = WatchdogInfo::from_bytes(data);
    if let Ok(info) = decoded {
        assert_eq!(usize::from(info.size), INFO_LEN);
    }

    // Use the input itself as the caller's output buffer.
    let mut out = data.to_vec();
    let before = out.clone();
    let info = decoded.unwrap_or_default();
    match info.encode_into(&mut out) {
        Ok(n) => {
            let declared = usize::from(u16::from_le_bytes([before[0], before[1]]));
            assert!(n <= declared.min(INFO_LEN));
            assert_eq!(out[0..2], before[0..2]);
            assert_eq!(out[n..], before[n..]);
        }
        Err(_) => assert_eq!(out, before),
    }
});
