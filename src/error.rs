//! Error taxonomy for the task-chain surface.
//!
//! # Design background (Why)
//! Per the chain's exception policy, a stage failure is opaque to the
//! library: it is routed to `onException` and then swallowed so that
//! after-run cleanup always runs. There is no public `Result`-returning API
//! on [`crate::handle::TaskHandle`] or [`crate::queue::ObservableQueue`] —
//! `join`/`cancel`/`push`/`close` genuinely cannot fail, so a contract
//! should not expose an error variant for a state transition that isn't a
//! failure.
use std::any::Any;
use std::fmt;

/// The opaque error token handed to `onException`.
///
/// Wraps the panic payload captured by `std::panic::catch_unwind` around a
/// stage invocation. The common case — `panic!("...")` or a `&str`/`String`
/// payload from an indexing panic — recovers a readable message; anything
/// else displays as an opaque placeholder, since the library has no way to
/// know how to render an arbitrary payload type.
pub struct StagePanic(Box<dyn Any + Send + 'static>);

impl StagePanic {
    pub(crate) fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self(payload)
    }

    /// The panic message, when the payload is a `&'static str` or `String`.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.0.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.0.downcast_ref::<String>().map(String::as_str)
        }
    }
}

impl fmt::Debug for StagePanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePanic")
            .field("message", &self.message().unwrap_or("<non-string panic payload>"))
            .finish()
    }
}

impl fmt::Display for StagePanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message().unwrap_or("<non-string panic payload>"))
    }
}

impl std::error::Error for StagePanic {}
