//! Thread spawning with explicit core, priority and stack.
//!
//! On ESP-IDF `std::thread` is a pthread over a FreeRTOS task, and
//! `esp_pthread_set_cfg()` sets the configuration used by the *next*
//! `pthread_create()` on the calling thread. The cfg→spawn pair must not
//! be interleaved with other thread creation on the same thread.
//!
//! On the host, core and priority are ignored.

use core::ffi::CStr;
use std::io;
use std::thread::{Builder, JoinHandle};

/// Smallest stack handed to a host thread, in bytes.
#[cfg(not(target_os = "espidf"))]
const HOST_STACK_FLOOR: usize = 64 * 1024;

/// CPU core identifiers for the ESP32 dual-core parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU: protocol stacks.
    Pro = 0,
    /// APP_CPU: application logic.
    App = 1,
}

/// Spawn `f` pinned to `core` at `priority` with `stack_size` bytes.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core<T: Send + 'static>(
    core: Core,
    priority: u8,
    stack_size: usize,
    name: &'static CStr,
    f: impl FnOnce() -> T + Send + 'static,
) -> io::Result<JoinHandle<T>> {
    // SAFETY: `cfg` is fully initialised by the default constructor and
    // `name` is a 'static NUL-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = i32::from(priority);
        cfg.stack_size = i32::try_from(stack_size).unwrap_or(i32::MAX);
        cfg.thread_name = name.as_ptr();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg: {ret}")));
    }

    let display = name.to_string_lossy();
    log::debug!(
        "spawning '{}' on {:?} (pri={}, stack={}B)",
        display,
        core,
        priority,
        stack_size
    );
    Builder::new().name(display.into_owned()).spawn(f)
}

/// Host fallback: plain `std::thread` with a stack floor.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core<T: Send + 'static>(
    _core: Core,
    _priority: u8,
    stack_size: usize,
    name: &'static CStr,
    f: impl FnOnce() -> T + Send + 'static,
) -> io::Result<JoinHandle<T>> {
    let display = name.to_string_lossy();
    log::debug!("spawning '{}' (host, stack={}B)", display, stack_size);
    Builder::new()
        .name(display.into_owned())
        .stack_size(stack_size.max(HOST_STACK_FLOOR))
        .spawn(f)
}
