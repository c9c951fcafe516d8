//! The external control surface for a running task.
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::cancel::CancellationTrigger;

/// Handle returned by `.run()` on both the plain and streaming builders.
///
/// `cancel()` and `join()` never panic, are safe to call in any order, and
/// are each idempotent — a second `cancel()` after the first is a no-op
/// (the trigger is already set), and a second `join()` after the first
/// returns immediately. Dropping the handle without joining implicitly
/// detaches the worker: unlike a C++ `std::thread`, a Rust
/// [`JoinHandle`] does not abort the process when dropped unjoined, so the
/// "implicit detach on destruction" invariant holds with no explicit
/// `detach` method needed.
pub struct TaskHandle {
    trigger: CancellationTrigger,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl TaskHandle {
    pub(crate) fn new(trigger: CancellationTrigger, worker: JoinHandle<()>) -> Self {
        Self {
            trigger,
            join: Mutex::new(Some(worker)),
        }
    }

    /// Requests cancellation. The worker observes this cooperatively at its
    /// next poll point; there is no preemption.
    pub fn cancel(&self) {
        self.trigger.set(true);
    }

    /// Blocks until the worker has exited. Safe to call after `cancel()`,
    /// safe to call more than once, safe to call from any thread.
    pub fn join(&self) {
        let worker = self.join.lock().take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    /// Whether `cancel()` has been requested. Exposed for tests and for
    /// callers that want to poll rather than block on `join()`.
    pub fn is_cancelled(&self) -> bool {
        self.trigger.get()
    }
}
