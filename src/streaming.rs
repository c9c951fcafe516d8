//! The observable streaming loop: an [`ObservableQueue`]-backed root stage
//! plus the outer drive loop that repeatedly invokes a [`Chain`] until the
//! queue is drained-and-closed or the task is cancelled.
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use tracing::debug;

use crate::cancel::{self, CancellationTrigger};
use crate::chain::{BypassFlag, Chain};
use crate::error::StagePanic;
use crate::handle::TaskHandle;
use crate::queue::{ObservableQueue, PopOutcome};

/// Entry point: `observe(queue).receive_one(f)` or `.receive_some(f)`
/// constructs the root stage of a streaming chain over `queue`.
pub fn observe<T>(queue: Arc<ObservableQueue<T>>) -> Observable<T> {
    Observable { queue }
}

/// A queue paired with the two ways to turn it into a streaming chain's
/// root stage.
pub struct Observable<T> {
    queue: Arc<ObservableQueue<T>>,
}

impl<T> Observable<T>
where
    T: Send + 'static,
{
    /// Builds a root stage that pops one item at a time and calls `f` with
    /// it. When the queue reports empty-and-closed, the bypass flag is set
    /// and the root returns `R::default()` without calling `f`.
    pub fn receive_one<R>(self, f: impl Fn(T) -> R + Send + 'static) -> StreamingTaskBuilder<R>
    where
        R: Default + Send + 'static,
    {
        let bypass = BypassFlag::new();
        let loop_bypass = bypass.clone();
        let queue = self.queue;
        let root = move || loop {
            match queue.pop_one() {
                PopOutcome::Item(obj) => return f(obj),
                PopOutcome::Retry => continue,
                PopOutcome::Closed => {
                    loop_bypass.set(true);
                    return R::default();
                }
            }
        };
        StreamingTaskBuilder {
            chain: Chain::root_streaming(root, bypass),
        }
    }

    /// Builds a root stage that drains the entire pending batch and calls
    /// `f` with it as a `Vec<T>`.
    pub fn receive_some<R>(self, f: impl Fn(Vec<T>) -> R + Send + 'static) -> StreamingTaskBuilder<R>
    where
        R: Default + Send + 'static,
    {
        let bypass = BypassFlag::new();
        let loop_bypass = bypass.clone();
        let queue = self.queue;
        let root = move || loop {
            match queue.pop_some() {
                PopOutcome::Item(batch) => return f(batch),
                PopOutcome::Retry => continue,
                PopOutcome::Closed => {
                    loop_bypass.set(true);
                    return R::default();
                }
            }
        };
        StreamingTaskBuilder {
            chain: Chain::root_streaming(root, bypass),
        }
    }
}

/// Fluent builder for a streaming chain. Shares its stage/hook vocabulary
/// with [`crate::task::TaskBuilder`]; the only behavioral difference is
/// `.run()`, which has no sync mode (a streaming chain by definition
/// iterates) and drives the chain in a loop instead of once.
pub struct StreamingTaskBuilder<R> {
    chain: Chain<R>,
}

impl<R> StreamingTaskBuilder<R>
where
    R: Default + Send + 'static,
{
    pub fn then<R2>(self, f: impl Fn() -> R2 + Send + 'static) -> StreamingTaskBuilder<R2>
    where
        R2: Default + Send + 'static,
    {
        StreamingTaskBuilder {
            chain: self.chain.then(f),
        }
    }

    pub fn get<R2>(self, f: impl Fn(R) -> R2 + Send + 'static) -> StreamingTaskBuilder<R2>
    where
        R2: Default + Send + 'static,
    {
        StreamingTaskBuilder {
            chain: self.chain.get(f),
        }
    }

    pub fn notified<D>(self, handler: impl Fn(&D) + Send + Clone + 'static) -> Self
    where
        D: 'static,
    {
        StreamingTaskBuilder {
            chain: self.chain.notified(handler),
        }
    }

    pub fn on_exception(self, handler: impl Fn(&StagePanic) + Send + 'static) -> Self {
        StreamingTaskBuilder {
            chain: self.chain.on_exception(handler),
        }
    }

    pub fn on_begin(self, handler: impl Fn() + Send + 'static) -> Self {
        StreamingTaskBuilder {
            chain: self.chain.on_begin(handler),
        }
    }

    pub fn on_end(self, handler: impl Fn() + Send + 'static) -> Self {
        StreamingTaskBuilder {
            chain: self.chain.on_end(handler),
        }
    }

    /// Spawns the dedicated worker and returns once it has started running
    /// the chain (not merely been queued). Always asynchronous — there is
    /// no sync mode for a streaming chain.
    ///
    /// The start handshake fires *before* the cancellation/bypass check on
    /// each loop entry, which avoids a livelock under an immediate
    /// `cancel()` racing the worker's first iteration: a handshake
    /// fulfilled only after an early `continue`/`break` would never signal
    /// if the very first check exits the loop.
    pub fn run(self) -> TaskHandle {
        let chain = self.chain;
        let trigger = CancellationTrigger::new();
        let worker_trigger = trigger.clone();
        let bypass = chain.bypass();

        let (ready_tx, ready_rx) = mpsc::sync_channel::<()>(0);

        let worker = thread::Builder::new()
            .name("asyncflow-streaming".into())
            .spawn(move || {
                chain.before_run(worker_trigger);
                let mut signalled = false;
                loop {
                    if !signalled {
                        signalled = true;
                        let _ = ready_tx.send(());
                    }
                    if cancel::is_cancelled() || bypass.as_ref().is_some_and(BypassFlag::get) {
                        break;
                    }
                    chain.run_once();
                }
                chain.after_run();
                debug!("streaming worker exited");
            })
            .expect("failed to spawn asyncflow streaming worker thread");

        // Wait for the worker to report it has entered the drive loop. If
        // the worker panics before sending (it shouldn't — before_run does
        // not run user code that can observably fail the handshake), fall
        // through rather than hang forever.
        let _ = ready_rx.recv();

        TaskHandle::new(trigger, worker)
    }
}
