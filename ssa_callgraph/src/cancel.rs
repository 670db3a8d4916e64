//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a cloneable flag the host trips from another
//! thread. Analyzers poll it at the top of each worklist iteration and
//! return [`crate::Error::Cancelled`] when it has tripped, leaving any
//! partially built call graph internally consistent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone of the token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Poll the token. Acquire semantics: once this returns true it never
    /// returns false again.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Check an optional token, mapping a tripped token to `Err(Cancelled)`.
pub(crate) fn check(token: Option<&CancelToken>) -> crate::Result<()> {
    match token {
        Some(t) if t.is_cancelled() => Err(crate::Error::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_trips_once_for_all_clones() {
        let t = CancelToken::new();
        let clone = t.clone();
        assert!(!t.is_cancelled());
        clone.cancel();
        assert!(t.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_check_maps_to_error() {
        let t = CancelToken::new();
        assert!(check(Some(&t)).is_ok());
        assert!(check(None).is_ok());
        t.cancel();
        assert!(matches!(check(Some(&t)), Err(crate::Error::Cancelled)));
    }
}
