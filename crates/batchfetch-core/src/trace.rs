//! Fetch execution tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! execution semantics.

///
/// FetchTraceSink
///

pub trait FetchTraceSink {
    fn on_event(&self, event: FetchTraceEvent);
}

///
/// FetchTraceEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchTraceEvent {
    /// One activation started with `count` pending calls.
    Start { entity: &'static str, count: usize },

    /// One store round trip was issued for this activation.
    RoundTrip { entity: &'static str },

    /// The activation was satisfied without any round trip.
    ShortCircuit { entity: &'static str },

    /// One activation finished, returning `rows` rows across all calls.
    Finish { entity: &'static str, rows: usize },

    /// The activation failed as a whole.
    Error { entity: &'static str },
}

///
/// ExecContext
///
/// Per-activation execution context. `debug` enables plain-text logging of
/// the composed query; `trace` receives structured events.
///

#[derive(Clone, Copy, Default)]
pub struct ExecContext<'a> {
    pub debug: bool,
    pub trace: Option<&'a dyn FetchTraceSink>,
}

impl<'a> ExecContext<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            debug: false,
            trace: None,
        }
    }

    #[must_use]
    pub const fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub const fn with_trace(mut self, trace: &'a dyn FetchTraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    pub(crate) fn emit(&self, event: FetchTraceEvent) {
        if let Some(trace) = self.trace {
            trace.on_event(event);
        }
    }

    pub(crate) fn debug_log(&self, s: impl AsRef<str>) {
        if self.debug {
            println!("[debug] {}", s.as_ref());
        }
    }
}
