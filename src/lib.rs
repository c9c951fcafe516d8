//! `asyncflow`: a small, header-only-style asynchronous task composition
//! library.
//!
//! An application expresses a unit of work as a chain of stages — produce
//! a value, transform it, consume it — runs the chain on a dedicated
//! worker thread, and controls it through a [`TaskHandle`]
//! (cancel/join/implicit-detach-on-drop). Stages can publish typed,
//! worker-scoped notifications and attach begin/end/exception hooks.
//!
//! A second entry point, [`observe`], turns a bounded
//! [`ObservableQueue`] into the root stage of a *streaming* chain: the
//! worker repeatedly pulls from the queue and drives the same chain
//! vocabulary until the queue drains-and-closes or the handle is
//! cancelled.
//!
//! # Plain chain
//! ```
//! use asyncflow::{spawn, RunMode};
//!
//! let handle = spawn(|| 1)
//!     .then(|| 2)
//!     .get(|v| v + 1)
//!     .run(RunMode::Sync);
//! handle.join();
//! ```
//!
//! # Streaming chain
//! ```
//! use asyncflow::{observe, ObservableQueue};
//!
//! let queue = ObservableQueue::<i32>::new();
//! queue.push_some([1, 2, 3]);
//! queue.close();
//!
//! let handle = observe(queue.clone()).receive_one(|v| v * 2).run();
//! handle.join();
//! ```

mod cancel;
mod chain;
mod error;
mod handle;
mod notify;
mod queue;
mod streaming;
mod task;

pub use cancel::{cancel_current, is_cancelled};
pub use error::StagePanic;
pub use handle::TaskHandle;
pub use notify::publish;
pub use queue::ObservableQueue;
pub use streaming::{observe, Observable, StreamingTaskBuilder};
pub use task::{spawn, RunMode, TaskBuilder};
