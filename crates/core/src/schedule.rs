//! Periodic background tasks
//!
//! Deferred-write flushes and cluster topology refreshes run on one
//! dedicated thread per adapter:
//!
//! ```text
//! start() ──► wait(initial_delay) ──► run ──► wait(period) ──► run ──► ...
//!                     │                            │
//!                   stop() wakes the thread and it exits without running
//! ```
//!
//! A run never overlaps with the next one (fixed delay, not fixed rate).
//! [`PeriodicTask::stop`] signals the thread and joins it, so once it returns
//! the task closure and everything it captured have been dropped.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Stop signal that wakes a sleeping task immediately.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    /// Create a signal in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake every waiter.
    pub fn stop(&self) {
        *self.inner.stopped.lock() = true;
        self.inner.condvar.notify_all();
    }

    /// Check if stop was requested.
    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep up to `duration`. Returns `true` if stop was requested.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self.inner.stopped.lock();
        while !*stopped {
            if self
                .inner
                .condvar
                .wait_until(&mut stopped, deadline)
                .timed_out()
            {
                break;
            }
        }
        *stopped
    }
}

/// A named thread running a closure at a fixed delay.
pub struct PeriodicTask {
    name: String,
    signal: StopSignal,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Spawn the task. The first run happens after `initial_delay`.
    pub fn start<F>(
        name: impl Into<String>,
        initial_delay: Duration,
        period: Duration,
        mut task: F,
    ) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let signal = StopSignal::new();
        let thread_signal = signal.clone();
        let thread_name = name.clone();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!(task = %thread_name, ?period, "periodic task started");
                let mut delay = initial_delay;
                while !thread_signal.wait(delay) {
                    task();
                    delay = period;
                }
                tracing::debug!(task = %thread_name, "periodic task stopped");
            })
            .map_err(|e| {
                tracing::error!(task = %name, error = %e, "failed to spawn periodic task");
                e
            })?;

        Ok(Self {
            name,
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Task (thread) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the task and wait for it to exit. Idempotent.
    pub fn stop(&self) {
        self.signal.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(task = %self.name, "periodic task panicked");
            }
        }
    }

    /// Check if the thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("stopped", &self.signal.is_stopped())
            .finish()
    }
}
