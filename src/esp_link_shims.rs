//! ESP-IDF weak symbols overridden by this crate.

/// TWDT user hook, called from the TWDT interrupt before ESP-IDF decides
/// whether to panic. Must stay lock-free and allocation-free.
#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn esp_task_wdt_isr_user_handler() {
    crate::adapters::esp_twdt::fire_user_line();
}
