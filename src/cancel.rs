//! Worker-scoped cancellation.
//!
//! # Design background (Why)
//! Every chain owns exactly one [`CancellationTrigger`] for the lifetime of a
//! single run, reachable only from code executing on that chain's worker.
//! Outside callers flip it through a [`crate::handle::TaskHandle`]; inside
//! code polls it cooperatively via [`is_cancelled`]. There is no
//! preemption — this is advisory, not enforced.
//!
//! # How
//! The trigger itself is a cheap `Arc<AtomicBool>`; the *scoping* is done by
//! a `thread_local!` slot that [`install`]/[`clear`] populate around
//! before-run/after-run. A thread with no active chain observes an empty
//! slot, so `is_cancelled()` answers `false` and `cancel_current()` is a
//! no-op — this is the "ambient state, cleared on teardown" requirement.
use std::cell::RefCell;
use std::sync::Arc;

// Swapped for loom's model-checked atomics under `--cfg loom` (feature
// `loom-model`); `Arc` keeps its standard implementation since loom only
// needs to instrument the atomic operations, not the reference count.
#[cfg(not(loom))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, Ordering};

thread_local! {
    static CURRENT: RefCell<Option<CancellationTrigger>> = const { RefCell::new(None) };
}

/// A per-run cancellation flag, cheaply cloneable and shared between the
/// chain that owns it and the [`TaskHandle`](crate::handle::TaskHandle)
/// that can flip it from any other thread.
#[derive(Clone, Debug)]
pub struct CancellationTrigger(Arc<AtomicBool>);

impl Default for CancellationTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationTrigger {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Installs `trigger` as the calling worker's active trigger. Called once,
/// at before-run.
pub(crate) fn install(trigger: CancellationTrigger) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(trigger));
}

/// Clears the calling worker's active trigger. Called once, at after-run.
pub(crate) fn clear() {
    CURRENT.with(|slot| *slot.borrow_mut() = None);
}

/// Returns `true` iff a trigger is bound on the calling worker *and* that
/// trigger has been set. A worker with no active chain always reports
/// "not cancelled".
pub fn is_cancelled() -> bool {
    CURRENT.with(|slot| slot.borrow().as_ref().is_some_and(CancellationTrigger::get))
}

/// Sets the calling worker's bound trigger, if any. A no-op off-worker.
pub fn cancel_current() {
    CURRENT.with(|slot| {
        if let Some(trigger) = slot.borrow().as_ref() {
            trigger.set(true);
        }
    });
}


/// Model-checked under `--cfg loom` (feature `loom-model`): exercises the
/// raw `set`/`get` pair across loom's scheduler permutations, independent
/// of the thread-local scoping tested above.
#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;

    #[test]
    fn set_is_visible_to_a_concurrent_get() {
        loom::model(|| {
            let trigger = CancellationTrigger::new();
            let canceler_trigger = trigger.clone();
            let observer_trigger = trigger.clone();

            let canceler = loom::thread::spawn(move || {
                canceler_trigger.set(true);
            });

            let observer = loom::thread::spawn(move || {
                while !observer_trigger.get() {
                    loom::thread::yield_now();
                }
            });

            canceler.join().unwrap();
            observer.join().unwrap();

            assert!(trigger.get());
        });
    }
}
