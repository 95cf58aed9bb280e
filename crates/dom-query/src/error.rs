//! Query errors.

use dom_tree::{DomError, SelectorError};
use std::time::Duration;
use thiserror::Error;

/// Errors from query construction and operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A selector failed to parse.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// A tree mutation was rejected.
    #[error(transparent)]
    Dom(#[from] DomError),

    /// `on_next` gave up waiting.
    #[error("timed out after {after:?} waiting for `{event}`")]
    Timeout {
        /// The awaited event types.
        event: String,
        /// The configured timeout.
        after: Duration,
    },

    /// `on_next` lost its listeners before the event fired.
    #[error("stopped waiting for `{event}`: listener removed")]
    Cancelled {
        /// The awaited event types.
        event: String,
    },
}
