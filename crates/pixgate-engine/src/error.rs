//! Engine error types
//!
//! Selection is total over ruleset content: matcher anomalies absorb to
//! non-matches and every installed snapshot was pre-validated, so the only
//! hot-path error is asking for a selection before any snapshot exists.

use thiserror::Error;

/// Selection error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectError {
    /// `select` was called before any snapshot was installed
    #[error("no active snapshot installed")]
    NoActiveSnapshot,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SelectError>;
