//! Error taxonomy.
//!
//! Mirrors the six kinds called out by the design: most are recovered
//! locally (I/O, listener faults, unknown statuses) and never escape the
//! component that produced them. Only configuration errors are meant to
//! propagate out of `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompassError {
    /// Fatal at startup: an unresolvable region with no default fallback,
    /// an out-of-range percentage, a missing required field.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// DNS or cloud-metadata I/O that failed; callers fall back to a
    /// benign default rather than propagating this further.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// A request was rejected by the rate limiter gate.
    #[error("overload: request rejected by rate limiter")]
    OverloadRejected,

    /// A supervised task's worker did not complete within its timeout.
    #[error("supervised task timed out")]
    TimeoutExceeded,

    /// A status-change listener raised an error; logged and swallowed.
    #[error("listener fault: {0}")]
    ListenerFault(String),

    /// A status mapper returned an unrecognized status; treated as no-op.
    #[error("unknown status")]
    UnknownStatus,
}

pub type Result<T> = std::result::Result<T, CompassError>;
