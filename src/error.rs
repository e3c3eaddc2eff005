//! Error types for the Phalanx library.
//!
//! All errors are represented by the [`PhalanxError`] enum. The variants follow
//! the way a grouping request can fail:
//!
//! - configuration errors reject the request before any scan starts,
//! - [`PhalanxError::TimeExceeded`] aborts a single scan and is recovered by the
//!   grouping orchestrator (the response is flagged as partial),
//! - internal errors signal a violated invariant and abort the request.
//!
//! # Examples
//!
//! ```
//! use phalanx::error::{PhalanxError, Result};
//!
//! fn resolve_field(name: &str) -> Result<()> {
//!     Err(PhalanxError::configuration(format!("unknown field: {name}")))
//! }
//!
//! let err = resolve_field("category").unwrap_err();
//! assert!(err.is_client_error());
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::index::DocId;

/// The main error type for Phalanx operations.
#[derive(Error, Debug)]
pub enum PhalanxError {
    /// The request cannot be executed as specified (missing grouping command,
    /// unresolvable field or function, invalid sort).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An argument is outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The shared search deadline expired during a scan.
    #[error("Time exceeded: allowed {allowed:?}, elapsed {elapsed:?}, last doc {last_doc}")]
    TimeExceeded {
        /// Time budget of the execution.
        allowed: Duration,
        /// Time spent when the deadline was observed.
        elapsed: Duration,
        /// Last global document id visited before aborting.
        last_doc: DocId,
    },

    /// An API was used out of order (e.g. replaying a collector that did not cache).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A broken invariant, such as merging field docs without sort values.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A worker thread could not be created or joined.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PhalanxError.
pub type Result<T> = std::result::Result<T, PhalanxError>;

impl PhalanxError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        PhalanxError::Configuration(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PhalanxError::InvalidArgument(msg.into())
    }

    /// Create a new invalid state error.
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        PhalanxError::InvalidState(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        PhalanxError::Internal(msg.into())
    }

    /// Create a new thread pool error.
    pub fn thread_pool<S: Into<String>>(msg: S) -> Self {
        PhalanxError::ThreadPool(msg.into())
    }

    /// Create a new time exceeded error.
    pub fn time_exceeded(allowed: Duration, elapsed: Duration, last_doc: DocId) -> Self {
        PhalanxError::TimeExceeded {
            allowed,
            elapsed,
            last_doc,
        }
    }

    /// Whether this error is the deadline signal raised by a time limited scan.
    pub fn is_time_exceeded(&self) -> bool {
        matches!(self, PhalanxError::TimeExceeded { .. })
    }

    /// Whether this error is caused by the request itself rather than the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PhalanxError::Configuration(_) | PhalanxError::InvalidArgument(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = PhalanxError::configuration("no grouping command");
        assert_eq!(error.to_string(), "Configuration error: no grouping command");

        let error = PhalanxError::internal("missing sort values");
        assert_eq!(error.to_string(), "Internal error: missing sort values");

        let error = PhalanxError::invalid_state("not cached");
        assert_eq!(error.to_string(), "Invalid state: not cached");
    }

    #[test]
    fn test_error_classification() {
        assert!(PhalanxError::configuration("x").is_client_error());
        assert!(PhalanxError::invalid_argument("x").is_client_error());
        assert!(!PhalanxError::internal("x").is_client_error());

        let timeout =
            PhalanxError::time_exceeded(Duration::from_millis(5), Duration::from_millis(7), 42);
        assert!(timeout.is_time_exceeded());
        assert!(!timeout.is_client_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        match PhalanxError::from(json_error) {
            PhalanxError::Json(_) => {}
            _ => panic!("Expected JSON error variant"),
        }
    }
}
