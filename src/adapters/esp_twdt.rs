//! ESP-IDF task watchdog adapter.
//!
//! Implements [`TwdtPort`] over `esp_task_wdt_*`. Subscription is per
//! FreeRTOS task: every call acts on the *calling* task, so the adapter
//! must only be driven from the task that owns the watchdog.
//!
//! The TWDT ISR calls the weak `esp_task_wdt_isr_user_handler` hook, which
//! [`esp_link_shims`](crate::esp_link_shims) overrides to fire the line
//! stored here.

use std::sync::OnceLock;

use esp_idf_svc::sys::{
    ESP_ERR_NOT_FOUND, EspError, esp, esp_task_wdt_add, esp_task_wdt_config_t,
    esp_task_wdt_delete, esp_task_wdt_reconfigure, esp_task_wdt_reset, esp_task_wdt_status,
};
use log::warn;

use crate::app::ports::{PortError, TwdtPort};
use crate::irq::IrqLine;

static USER_LINE: OnceLock<IrqLine> = OnceLock::new();

/// Called from the TWDT interrupt. Lock-free.
pub(crate) fn fire_user_line() {
    if let Some(line) = USER_LINE.get() {
        line.fire();
    }
}

fn port_err(e: EspError) -> PortError {
    PortError(e.code())
}

/// The TWDT as seen by the task that created this adapter.
#[derive(Debug, Default)]
pub struct EspTwdt {
    timeout_ms: Option<u32>,
}

impl EspTwdt {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TwdtPort for EspTwdt {
    fn reconfigure(&mut self, timeout_ms: u32, trigger_panic: bool) -> Result<(), PortError> {
        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic,
        };
        // SAFETY: `cfg` outlives the call; ESP-IDF copies it.
        esp!(unsafe { esp_task_wdt_reconfigure(&cfg) }).map_err(port_err)?;
        self.timeout_ms = Some(timeout_ms);
        Ok(())
    }

    fn subscribe(&mut self) -> Result<(), PortError> {
        // SAFETY: a null handle means the calling task.
        esp!(unsafe { esp_task_wdt_add(core::ptr::null_mut()) }).map_err(port_err)
    }

    fn unsubscribe(&mut self) -> Result<(), PortError> {
        // SAFETY: a null handle means the calling task.
        esp!(unsafe { esp_task_wdt_delete(core::ptr::null_mut()) }).map_err(port_err)
    }

    fn reset(&mut self) -> Result<(), PortError> {
        // SAFETY: no arguments; acts on the calling task.
        esp!(unsafe { esp_task_wdt_reset() }).map_err(port_err)
    }

    fn is_subscribed(&self) -> bool {
        // SAFETY: a null handle means the calling task.
        let ret = unsafe { esp_task_wdt_status(core::ptr::null_mut()) };
        if ret != 0 && ret != ESP_ERR_NOT_FOUND as i32 {
            warn!("twdt: status query returned {}", ret);
        }
        ret == 0
    }

    fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    fn attach_interrupt(&mut self, line: IrqLine) {
        if USER_LINE.set(line).is_err() {
            warn!("twdt: user interrupt hook already routed");
        }
    }
}
