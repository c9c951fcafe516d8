//! The stage chain model: how a typed pipeline is built, how values flow
//! stage to stage, and how the begin/run/end lifecycle and its
//! side-channel hooks attach to it.
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cancel::{self, CancellationTrigger};
use crate::error::StagePanic;
use crate::notify;

/// Shared across every stage of a streaming chain; never present on a
/// plain (non-streaming) chain. Once set, every subsequent stage
/// evaluation in the current iteration short-circuits to its own
/// `Default` value instead of calling user code, and the streaming drive
/// loop exits at the next iteration boundary.
#[derive(Clone, Default)]
pub(crate) struct BypassFlag(Arc<AtomicBool>);

impl BypassFlag {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

type VoidHook = Box<dyn Fn() + Send + 'static>;
type ExceptionHook = Box<dyn Fn(&StagePanic) + Send + 'static>;

/// The tail stage of a chain together with its accumulated side-channel
/// hooks. `.then()`/`.get()` on the public builders produce a *new*
/// `Chain<R2>` whose `run` closure wraps the parent's; the hooks
/// (`on_begin`/`on_end`/`on_exception`/notifications) live only on the
/// final tail: they are attached after the stage pipeline is fully built,
/// so only one instance ever carries them.
pub(crate) struct Chain<R> {
    run: Box<dyn Fn() -> R + Send + 'static>,
    bypass: Option<BypassFlag>,
    on_begin: Option<VoidHook>,
    on_end: Option<VoidHook>,
    on_exception: Option<ExceptionHook>,
    notify_install: Vec<VoidHook>,
    notify_uninstall: Vec<VoidHook>,
}

impl<R> Chain<R>
where
    R: Default + Send + 'static,
{
    pub(crate) fn root(f: impl Fn() -> R + Send + 'static) -> Self {
        Self {
            run: Box::new(f),
            bypass: None,
            on_begin: None,
            on_end: None,
            on_exception: None,
            notify_install: Vec::new(),
            notify_uninstall: Vec::new(),
        }
    }

    pub(crate) fn root_streaming(f: impl Fn() -> R + Send + 'static, bypass: BypassFlag) -> Self {
        Self {
            run: Box::new(f),
            bypass: Some(bypass),
            on_begin: None,
            on_end: None,
            on_exception: None,
            notify_install: Vec::new(),
            notify_uninstall: Vec::new(),
        }
    }

    pub(crate) fn bypass(&self) -> Option<BypassFlag> {
        self.bypass.clone()
    }

    /// Appends a stage that discards the parent's value (`Then`).
    pub(crate) fn then<R2>(self, f: impl Fn() -> R2 + Send + 'static) -> Chain<R2>
    where
        R2: Default + Send + 'static,
    {
        let parent_run = self.run;
        let bypass = self.bypass.clone();
        let next = move || {
            parent_run();
            if bypass.as_ref().is_some_and(BypassFlag::get) {
                return R2::default();
            }
            f()
        };
        Chain {
            run: Box::new(next),
            bypass: self.bypass,
            on_begin: None,
            on_end: None,
            on_exception: None,
            notify_install: Vec::new(),
            notify_uninstall: Vec::new(),
        }
    }

    /// Appends a stage that consumes the parent's value (`Get`).
    pub(crate) fn get<R2>(self, f: impl Fn(R) -> R2 + Send + 'static) -> Chain<R2>
    where
        R2: Default + Send + 'static,
    {
        let parent_run = self.run;
        let bypass = self.bypass.clone();
        let next = move || {
            let parent_value = parent_run();
            if bypass.as_ref().is_some_and(BypassFlag::get) {
                return R2::default();
            }
            f(parent_value)
        };
        Chain {
            run: Box::new(next),
            bypass: self.bypass,
            on_begin: None,
            on_end: None,
            on_exception: None,
            notify_install: Vec::new(),
            notify_uninstall: Vec::new(),
        }
    }

    pub(crate) fn notified<D>(mut self, handler: impl Fn(&D) + Send + Clone + 'static) -> Self
    where
        D: 'static,
    {
        let install_handler = handler.clone();
        self.notify_install
            .push(Box::new(move || notify::bind::<D>(install_handler.clone())));
        self.notify_uninstall.push(Box::new(notify::unbind::<D>));
        self
    }

    pub(crate) fn on_exception(mut self, handler: impl Fn(&StagePanic) + Send + 'static) -> Self {
        self.on_exception = Some(Box::new(handler));
        self
    }

    pub(crate) fn on_begin(mut self, handler: impl Fn() + Send + 'static) -> Self {
        self.on_begin = Some(Box::new(handler));
        self
    }

    pub(crate) fn on_end(mut self, handler: impl Fn() + Send + 'static) -> Self {
        self.on_end = Some(Box::new(handler));
        self
    }

    /// Runs the before-run/run/after-run lifecycle exactly once. For a
    /// streaming chain, the caller wraps repeated calls to `run_once` in
    /// the drive loop (§4.7); `before_run`/`after_run` are invoked once
    /// around the whole loop, not once per iteration — see
    /// [`Chain::before_run`]/[`Chain::after_run`].
    pub(crate) fn run_once(&self) -> R {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.run)())) {
            Ok(value) => value,
            Err(payload) => {
                if let Some(handler) = &self.on_exception {
                    handler(&StagePanic::new(payload));
                }
                R::default()
            }
        }
    }

    pub(crate) fn before_run(&self, trigger: CancellationTrigger) {
        if let Some(bypass) = &self.bypass {
            bypass.set(false);
        }
        cancel::install(trigger);
        for install in &self.notify_install {
            install();
        }
        if let Some(on_begin) = &self.on_begin {
            on_begin();
        }
    }

    pub(crate) fn after_run(&self) {
        if let Some(on_end) = &self.on_end {
            on_end();
        }
        for uninstall in &self.notify_uninstall {
            uninstall();
        }
        cancel::clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn trace() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn lifecycle_order_and_bypass_short_circuit() {
        let log = trace();
        let l1 = log.clone();
        let l2 = log.clone();
        let l3 = log.clone();

        let bypass = BypassFlag::new();
        let root_bypass = bypass.clone();

        // Root stands in for a streaming root that discovers its input is
        // drained mid-call: it sets the flag itself and returns, so the
        // stage chained after it must observe the flag and short-circuit.
        let chain = Chain::<i32>::root_streaming(
            move || {
                l1.lock().unwrap().push("root".into());
                root_bypass.set(true);
                1
            },
            bypass,
        )
        .get(move |v| {
            l2.lock().unwrap().push(format!("get {v}"));
            v + 1
        })
        .on_begin(move || l3.lock().unwrap().push("begin".into()));

        let trigger = CancellationTrigger::new();
        chain.before_run(trigger);
        let result = chain.run_once();
        chain.after_run();

        assert_eq!(result, 0); // short-circuited to i32::default()
        assert_eq!(
            *log.lock().unwrap(),
            vec!["begin".to_string(), "root".to_string()]
        ); // get never called
    }

    #[test]
    fn before_run_resets_bypass_for_each_iteration() {
        let bypass = BypassFlag::new();
        bypass.set(true);

        let chain = Chain::<i32>::root_streaming(|| 1, bypass.clone());
        let trigger = CancellationTrigger::new();
        chain.before_run(trigger);

        assert!(!bypass.get());
    }

    #[test]
    fn exception_is_swallowed_and_handler_invoked_once() {
        let log = trace();
        let l1 = log.clone();

        let chain = Chain::<i32>::root(|| 1)
            .then(|| panic!("boom"))
            .on_exception(move |e| l1.lock().unwrap().push(e.to_string()));

        let trigger = CancellationTrigger::new();
        chain.before_run(trigger);
        let result = chain.run_once();
        chain.after_run();

        assert_eq!(result, 0);
        assert_eq!(*log.lock().unwrap(), vec!["boom".to_string()]);
    }
}
