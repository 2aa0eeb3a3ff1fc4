//! Software liveness monitor.
//!
//! The application proves forward progress by calling
//! [`checkin`](LivenessMonitor::checkin) (or [`Checkin::checkin`] from any
//! thread). A dedicated high-priority thread sleeps until the deadline
//! `last_checkin + timeout`; if no checkin moved the deadline by then, it
//! runs the stall callback once and exits.
//!
//! ```text
//!            checkin()             checkin()
//!   ──────────┼────────────────────────┼───────────────────────▶ t
//!             └── park(timeout) ──┐    └── park(timeout) ──┐
//!                      wake, not expired                 wake, expired
//!                                                        → callback, exit
//! ```
//!
//! This tier is independent of the hardware watchdog: it catches stalls
//! while the scheduler still runs, and leaves lockups to the hardware.

use core::ffi::CStr;
use core::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::adapters::time::MonotonicClock;
use crate::drivers::task_pin::{Core, spawn_on_core};
use crate::error::{Error, Result};
use crate::schema::duration_to_ms_ceil;

/// Stack for the monitor thread unless overridden, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024;
/// FreeRTOS priority of the monitor thread (just below the timer task).
pub const MONITOR_PRIORITY: u8 = 23;

const DEFAULT_NAME: &CStr = c"appwdt";

/// Whether the stall callback runs when the monitor is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposePolicy {
    /// The thread exits quietly.
    #[default]
    Silent,
    /// Disposal counts as an expiry and runs the callback.
    Fire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorState {
    Running = 0,
    /// The callback ran after a missed deadline.
    Fired = 1,
    Disposed = 2,
}

impl MonitorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Fired,
            _ => Self::Disposed,
        }
    }
}

struct Shared {
    clock: MonotonicClock,
    last_checkin_us: AtomicU64,
    timeout_us: AtomicU64,
    state: AtomicU8,
}

impl Shared {
    fn checkin(&self) {
        self.last_checkin_us
            .store(self.clock.uptime_us(), Ordering::Release);
    }

    fn state(&self) -> MonitorState {
        MonitorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `Running -> to`. Exactly one caller wins.
    fn leave_running(&self, to: MonitorState) -> bool {
        self.state
            .compare_exchange(
                MonitorState::Running as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Handle of the monitor registered with [`LivenessMonitorBuilder::process_wide`].
static PROCESS_WIDE: RwLock<Option<Checkin>> = parking_lot::const_rwlock(None);

/// Check in with the process-wide monitor, if one is registered.
///
/// Lets system code report progress without holding a handle. Returns
/// `false` when no process-wide monitor exists.
pub fn checkin() -> bool {
    match PROCESS_WIDE.read().as_ref() {
        Some(handle) => {
            handle.checkin();
            true
        }
        None => false,
    }
}

/// Cloneable checkin handle for threads that do not own the monitor.
#[derive(Clone)]
pub struct Checkin {
    shared: Arc<Shared>,
}

impl Checkin {
    pub fn checkin(&self) {
        self.shared.checkin();
    }
}

/// Configures and spawns a [`LivenessMonitor`].
#[must_use]
pub struct LivenessMonitorBuilder {
    timeout: Duration,
    stack_size: usize,
    dispose_policy: DisposePolicy,
    name: &'static CStr,
    priority: u8,
    process_wide: bool,
}

impl LivenessMonitorBuilder {
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn dispose_policy(mut self, policy: DisposePolicy) -> Self {
        self.dispose_policy = policy;
        self
    }

    /// Thread name shown in task lists.
    pub fn name(mut self, name: &'static CStr) -> Self {
        self.name = name;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Make [`checkin()`] reach this monitor. A later process-wide
    /// monitor replaces it.
    pub fn process_wide(mut self) -> Self {
        self.process_wide = true;
        self
    }

    /// Check in and start monitoring. `InvalidArgument` for a zero
    /// timeout, `Internal` if the thread cannot be created.
    pub fn spawn(self, callback: impl FnOnce() + Send + 'static) -> Result<LivenessMonitor> {
        let timeout_ms = u64::from(duration_to_ms_ceil(self.timeout));
        if timeout_ms == 0 {
            return Err(Error::InvalidArgument);
        }

        let shared = Arc::new(Shared {
            clock: MonotonicClock::new(),
            last_checkin_us: AtomicU64::new(0),
            timeout_us: AtomicU64::new(timeout_ms * 1_000),
            state: AtomicU8::new(MonitorState::Running as u8),
        });
        shared.checkin();

        let worker = Arc::clone(&shared);
        let policy = self.dispose_policy;
        let thread = spawn_on_core(Core::App, self.priority, self.stack_size, self.name, move || {
            watch(&worker, callback, policy);
        })
        .map_err(|e| {
            error!("liveness: monitor thread spawn failed: {e}");
            Error::Internal
        })?;

        info!(
            "liveness: monitoring with {} ms timeout (dispose={:?})",
            timeout_ms, policy
        );
        if self.process_wide {
            let previous = PROCESS_WIDE.write().replace(Checkin {
                shared: Arc::clone(&shared),
            });
            if previous.is_some() {
                warn!("liveness: replacing the process-wide monitor");
            }
        }
        Ok(LivenessMonitor {
            shared,
            thread: Some(thread),
        })
    }
}

/// Stall detector running on its own thread.
///
/// Dropping the monitor disposes it and joins the thread.
pub struct LivenessMonitor {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    /// Monitor with the default dispose policy and thread name.
    pub fn new(
        timeout: Duration,
        callback: impl FnOnce() + Send + 'static,
        stack_size: usize,
    ) -> Result<Self> {
        Self::builder(timeout).stack_size(stack_size).spawn(callback)
    }

    pub fn builder(timeout: Duration) -> LivenessMonitorBuilder {
        LivenessMonitorBuilder {
            timeout,
            stack_size: DEFAULT_STACK_SIZE,
            dispose_policy: DisposePolicy::default(),
            name: DEFAULT_NAME,
            priority: MONITOR_PRIORITY,
            process_wide: false,
        }
    }

    /// Record forward progress. Lock-free; callable from any thread.
    pub fn checkin(&self) {
        self.shared.checkin();
    }

    pub fn checkin_handle(&self) -> Checkin {
        Checkin {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.shared.state()
    }

    /// Timeout currently in force; zero once disposed.
    pub fn timeout(&self) -> Duration {
        Duration::from_micros(self.shared.timeout_us.load(Ordering::Acquire))
    }

    /// The monitor thread has exited.
    pub fn is_complete(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop monitoring. The thread wakes, sees an expired deadline and
    /// exits; the callback runs only under [`DisposePolicy::Fire`].
    pub fn dispose(&self) {
        // State before timeout: a thread that sees the zero timeout also sees `Disposed`.
        if self.shared.leave_running(MonitorState::Disposed) {
            info!("liveness: disposed");
        }
        self.shared.timeout_us.store(0, Ordering::Release);
        let mut global = PROCESS_WIDE.write();
        if global
            .as_ref()
            .is_some_and(|handle| Arc::ptr_eq(&handle.shared, &self.shared))
        {
            *global = None;
        }
        drop(global);
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.dispose();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("liveness: stall callback panicked");
            }
        }
    }
}

fn watch(shared: &Shared, callback: impl FnOnce(), policy: DisposePolicy) {
    loop {
        let timeout = shared.timeout_us.load(Ordering::Acquire);
        let last = shared.last_checkin_us.load(Ordering::Acquire);
        let elapsed = shared.clock.uptime_us().saturating_sub(last);
        // Both stamps are floored to whole microseconds; only a strictly
        // larger difference proves the full timeout has passed.
        if elapsed > timeout {
            if shared.leave_running(MonitorState::Fired) {
                warn!("liveness: no checkin for {} us", elapsed);
                callback();
            } else if policy == DisposePolicy::Fire {
                callback();
            }
            return;
        }
        thread::park_timeout(Duration::from_micros(timeout - elapsed + 1));
    }
}
