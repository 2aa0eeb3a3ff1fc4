//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements                          | Connects to                 |
//! |-------------|-------------------------------------|-----------------------------|
//! | `esp_twdt`  | TwdtPort                            | ESP-IDF `esp_task_wdt_*`    |
//! | `sim`       | NrfWdtPort, RtlWdgPort, TwdtPort    | In-memory peripheral models |
//! | `time`      | (monotonic clock)                   | `esp_timer` / `Instant`     |

#[cfg(target_os = "espidf")]
pub mod esp_twdt;
#[cfg(any(test, not(target_os = "espidf")))]
pub mod sim;
pub mod time;
