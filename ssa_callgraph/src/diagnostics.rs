//! Analysis diagnostics.
//!
//! Analyzers silently underapproximate in several places (bodyless
//! functions, dynamic sites no candidate matches). This collector makes
//! those events observable without turning them into errors or output
//! noise: collection is disabled by default and scoped to the current
//! thread, matching the single-threaded-per-run analysis model.
//!
//! Enable with `diagnostics::enable()`, retrieve and clear with
//! `diagnostics::take()`.

use std::cell::RefCell;

use ssa_ir::{FuncId, InstrId};

/// A diagnostic event recorded during an analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A dynamic call site resolved to no candidates; no edges were added.
    EmptyCandidateSet {
        site: InstrId,
        method: Option<String>,
    },
    /// A function without a body was reached; its callees are unknown.
    SkippedExternal { func: FuncId },
    /// A synthetic node was short-circuited out of the graph.
    DeletedSynthetic { func: FuncId },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::EmptyCandidateSet { site, method } => match method {
                Some(m) => write!(f, "no candidates for method '{}' at instruction {}", m, site),
                None => write!(f, "no candidates at instruction {}", site),
            },
            Event::SkippedExternal { func } => {
                write!(f, "function {} has no body; callees unknown", func)
            }
            Event::DeletedSynthetic { func } => {
                write!(f, "deleted synthetic node for function {}", func)
            }
        }
    }
}

thread_local! {
    static COLLECTOR: RefCell<Option<Vec<Event>>> = const { RefCell::new(None) };
}

/// Start collecting events on this thread.
pub fn enable() {
    COLLECTOR.with(|c| {
        let mut c = c.borrow_mut();
        if c.is_none() {
            *c = Some(Vec::new());
        }
    });
}

/// Stop collecting and drop anything collected so far.
pub fn disable() {
    COLLECTOR.with(|c| *c.borrow_mut() = None);
}

/// Retrieve and clear the collected events. Empty when disabled.
pub fn take() -> Vec<Event> {
    COLLECTOR.with(|c| match c.borrow_mut().as_mut() {
        Some(events) => std::mem::take(events),
        None => Vec::new(),
    })
}

/// Record an event if collection is enabled. Cheap when disabled.
pub(crate) fn emit(event: Event) {
    COLLECTOR.with(|c| {
        if let Some(events) = c.borrow_mut().as_mut() {
            events.push(event);
        }
    });
}
