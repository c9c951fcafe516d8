//! A bounded, multi-producer/single-consumer, closeable queue. The
//! streaming drive loop (`src/streaming.rs`) is the only intended
//! consumer; producers on any number of threads may `push_one`/`push_some`
//! concurrently.
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::cancel;

/// A fixed poll interval used by `push_one`/`push_some` while the queue is
/// at capacity: a deliberate busy-wait gate rather than a defect — the
/// observable contract (backpressure, silent no-op once closed or
/// cancelled) is what matters, not the wait strategy.
const PUSH_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// How long `pop_one`/`pop_some` wait on the condition variable before
/// re-checking the queue. A timeout here means "try again", not "closed".
const POP_WAIT_TIMEOUT: Duration = Duration::from_millis(300);

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Outcome of a single `pop_one`/`pop_some` attempt.
pub(crate) enum PopOutcome<T> {
    /// An item (or batch) was available and has been removed from the queue.
    Item(T),
    /// The queue was empty and the wait timed out; callers should retry.
    Retry,
    /// The queue is empty *and* closed — no more items will ever arrive.
    Closed,
}

/// Bounded FIFO queue with a monotonic close flag and a single-shot
/// completion callback.
///
/// `limitation` is a soft capacity: `push_one`/`push_some` block (via
/// [`PUSH_POLL_INTERVAL`] polling) while `len() >= limitation`, but once the
/// gate opens, `push_some` appends the entire batch regardless of how far
/// over `limitation` that leaves the queue. This is not a bug: the gate is
/// an admission check, not a reservation.
pub struct ObservableQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    limitation: usize,
    on_completed: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<T> ObservableQueue<T> {
    /// An effectively-unbounded queue with no completion callback.
    pub fn new() -> Arc<Self> {
        Self::with_options(usize::MAX, None)
    }

    /// A queue bounded to `limitation` pending items.
    pub fn bounded(limitation: usize) -> Arc<Self> {
        Self::with_options(limitation, None)
    }

    /// A queue that invokes `on_completed` exactly once, when the last
    /// `Arc` reference is dropped.
    pub fn with_completion(
        limitation: usize,
        on_completed: impl FnOnce() + Send + 'static,
    ) -> Arc<Self> {
        Self::with_options(limitation, Some(Box::new(on_completed)))
    }

    fn with_options(limitation: usize, on_completed: Option<Box<dyn FnOnce() + Send>>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            limitation,
            on_completed: Mutex::new(on_completed),
        })
    }

    /// Marks the queue closed. Monotonic: closing twice is a no-op. Items
    /// already enqueued remain drainable by `pop_one`/`pop_some`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
    }

    /// Enqueues a single item, blocking while the queue is at capacity.
    /// Silently does nothing if the queue is closed, or if the calling
    /// thread's worker has been cancelled (§4.1) — neither is an error.
    pub fn push_one(&self, item: T) {
        loop {
            let mut inner = self.inner.lock();
            if inner.closed || cancel::is_cancelled() {
                return;
            }
            if inner.items.len() < self.limitation {
                inner.items.push_back(item);
                self.not_empty.notify_all();
                return;
            }
            drop(inner);
            thread::sleep(PUSH_POLL_INTERVAL);
        }
    }

    /// Enqueues a batch, blocking while the queue is at capacity. The
    /// whole batch is appended atomically once the gate opens — see the
    /// struct-level documentation for the non-hard-cap quirk this implies.
    pub fn push_some(&self, items: impl IntoIterator<Item = T>) {
        let mut items: Vec<T> = items.into_iter().collect();
        loop {
            let mut inner = self.inner.lock();
            if inner.closed || cancel::is_cancelled() {
                return;
            }
            if inner.items.len() < self.limitation {
                inner.items.extend(items.drain(..));
                self.not_empty.notify_all();
                return;
            }
            drop(inner);
            thread::sleep(PUSH_POLL_INTERVAL);
        }
    }

    /// Pops the front item, waiting up to [`POP_WAIT_TIMEOUT`] on the
    /// condition variable if the queue is currently empty.
    pub(crate) fn pop_one(&self) -> PopOutcome<T> {
        let mut inner = self.inner.lock();
        if inner.items.is_empty() {
            self.not_empty.wait_for(&mut inner, POP_WAIT_TIMEOUT);
        }
        if let Some(item) = inner.items.pop_front() {
            return PopOutcome::Item(item);
        }
        if inner.closed {
            trace!("observable queue drained and closed");
            PopOutcome::Closed
        } else {
            PopOutcome::Retry
        }
    }

    /// Pops every currently-queued item as a batch, waiting up to
    /// [`POP_WAIT_TIMEOUT`] if the queue is currently empty.
    pub(crate) fn pop_some(&self) -> PopOutcome<Vec<T>> {
        let mut inner = self.inner.lock();
        if inner.items.is_empty() {
            self.not_empty.wait_for(&mut inner, POP_WAIT_TIMEOUT);
        }
        if inner.items.is_empty() {
            return if inner.closed {
                PopOutcome::Closed
            } else {
                PopOutcome::Retry
            };
        }
        let drained: Vec<T> = inner.items.drain(..).collect();
        PopOutcome::Item(drained)
    }

    /// Current number of items waiting to be popped. Exposed for tests and
    /// diagnostics, not part of the blocking protocol.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for ObservableQueue<T> {
    fn drop(&mut self) {
        if let Some(on_completed) = self.on_completed.lock().take() {
            on_completed();
        }
    }
}
