//! Analysis errors.

use thiserror::Error;

/// The closed set of failures an analysis or the formatting stage can
/// report. None of these are recovered from internally: the analyzer
/// reports and returns. Robustness cases that are *not* errors: functions
/// without bodies (underapproximation), dynamic sites with empty candidate
/// sets (no edges), and cycles in the propagation or call graph (handled
/// by monotone fixpoints).
#[derive(Debug, Error)]
pub enum Error {
    /// An invariant of the consumed IR does not hold.
    #[error("invalid IR: {reason}")]
    InvalidIr { reason: String },

    /// RTA was invoked without any root function.
    #[error("no entry point: no main packages found")]
    NoEntryPoint,

    /// An unrecognized `--algo` value.
    #[error("unknown algorithm: {name}")]
    UnknownAlgorithm { name: String },

    /// A recognized but disabled feature, e.g. the reserved `pta` name.
    #[error("{what}")]
    Unsupported { what: String },

    /// The format template could not be parsed. The call graph itself is
    /// still valid and may be handed to another consumer.
    #[error("invalid format template: {reason}")]
    InvalidFormat { reason: String },

    /// Cooperative cancellation tripped. Partial output is never emitted.
    #[error("analysis cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ssa_ir::InvalidIr> for Error {
    fn from(e: ssa_ir::InvalidIr) -> Self {
        Error::InvalidIr { reason: e.reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
