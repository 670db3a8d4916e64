//! IR contract violations.

use thiserror::Error;

/// An invariant of the consumed IR does not hold. Raised by the builder on
/// `finish` and by deserialization of externally produced programs; the
/// analyzers treat it as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid IR: {reason}")]
pub struct InvalidIr {
    pub reason: String,
}

impl InvalidIr {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
