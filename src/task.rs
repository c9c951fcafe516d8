//! The plain (non-streaming) task builder: build a chain from `spawn(f)`,
//! extend it with `.then()`/`.get()`, attach hooks, and launch it on a
//! dedicated worker with `.run(mode)`.
use std::thread;

use tracing::debug;

use crate::cancel::CancellationTrigger;
use crate::chain::Chain;
use crate::error::StagePanic;
use crate::handle::TaskHandle;

/// Whether `.run()` blocks until the worker finishes before returning its
/// handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Join the worker before returning; the handle is already finished.
    Sync,
    /// Return the handle immediately; the worker runs concurrently.
    #[default]
    Async,
}

/// Starts a chain rooted on `f`, a nullary function producing the chain's
/// first value.
pub fn spawn<R>(f: impl Fn() -> R + Send + 'static) -> TaskBuilder<R>
where
    R: Default + Send + 'static,
{
    TaskBuilder {
        chain: Chain::root(f),
    }
}

/// Fluent builder for a single-run (non-streaming) task chain.
pub struct TaskBuilder<R> {
    chain: Chain<R>,
}

impl<R> TaskBuilder<R>
where
    R: Default + Send + 'static,
{
    /// Appends a stage that discards the parent's return value.
    pub fn then<R2>(self, f: impl Fn() -> R2 + Send + 'static) -> TaskBuilder<R2>
    where
        R2: Default + Send + 'static,
    {
        TaskBuilder {
            chain: self.chain.then(f),
        }
    }

    /// Appends a stage that consumes the parent's return value.
    pub fn get<R2>(self, f: impl Fn(R) -> R2 + Send + 'static) -> TaskBuilder<R2>
    where
        R2: Default + Send + 'static,
    {
        TaskBuilder {
            chain: self.chain.get(f),
        }
    }

    /// While this chain runs on its worker, `publish::<D>(v)` calls
    /// `handler(&v)`.
    pub fn notified<D>(self, handler: impl Fn(&D) + Send + Clone + 'static) -> Self
    where
        D: 'static,
    {
        TaskBuilder {
            chain: self.chain.notified(handler),
        }
    }

    /// Runs once if any stage (or `onBegin`/`onEnd`) panics; the iteration
    /// is then considered finished — there is no retry.
    pub fn on_exception(self, handler: impl Fn(&StagePanic) + Send + 'static) -> Self {
        TaskBuilder {
            chain: self.chain.on_exception(handler),
        }
    }

    /// Runs once, before the first stage body, on the worker.
    pub fn on_begin(self, handler: impl Fn() + Send + 'static) -> Self {
        TaskBuilder {
            chain: self.chain.on_begin(handler),
        }
    }

    /// Runs once, after the final stage and after-run cleanup, on the
    /// worker. Invoked even when a stage panicked.
    pub fn on_end(self, handler: impl Fn() + Send + 'static) -> Self {
        TaskBuilder {
            chain: self.chain.on_end(handler),
        }
    }

    /// Spawns a dedicated worker running before-run/run/after-run exactly
    /// once, and returns a handle to it. `.run()` only returns after the
    /// worker thread has actually been started (not merely queued);
    /// `RunMode::Sync` additionally blocks until it finishes.
    pub fn run(self, mode: RunMode) -> TaskHandle {
        let chain = self.chain;
        let trigger = CancellationTrigger::new();
        let worker_trigger = trigger.clone();

        let worker = thread::Builder::new()
            .name("asyncflow-task".into())
            .spawn(move || {
                chain.before_run(worker_trigger);
                chain.run_once();
                chain.after_run();
                debug!("task worker exited");
            })
            .expect("failed to spawn asyncflow task worker thread");

        if mode == RunMode::Sync {
            let handle = TaskHandle::new(trigger, worker);
            handle.join();
            handle
        } else {
            TaskHandle::new(trigger, worker)
        }
    }
}
