//! Error taxonomy of the engine.

use thiserror::Error;

/// Errors returned by engine operations.
///
/// Benign loop exits (user callback returned false, iteration cap reached,
/// desired end time reached) are `Ok`, not errors. Errors never propagate
/// across `stop`: after `stop` the engine accepts new options and a new
/// `start`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Rejected input: wrong state size, unknown ODE solver, out-of-range
    /// option value, incompatible update periods, sub-millisecond simulation
    /// duration. Raised before any side effect.
    #[error("invalid input: {0}")]
    BadInput(String),

    /// Operation refused in the current state (not running / already
    /// running / registry locked), or a fatal numerical failure (NaN state,
    /// low-level ODE solver exhaustion).
    #[error("{0}")]
    Generic(String),

    /// A collaborator was not initialized when the engine needed it.
    #[error("initialization failed: {0}")]
    InitFailed(String),
}

impl EngineError {
    /// Shorthand for a `BadInput` with a formatted message.
    #[must_use]
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    /// Shorthand for a `Generic` with a formatted message.
    #[must_use]
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Shorthand for an `InitFailed` with a formatted message.
    #[must_use]
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }
}
