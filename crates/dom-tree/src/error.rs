//! DOM error types.

use thiserror::Error;

/// A CSS selector that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector `{selector}`: {message} at offset {offset}")]
pub struct SelectorError {
    /// The selector as given.
    pub selector: String,
    /// What went wrong.
    pub message: String,
    /// Byte offset of the problem.
    pub offset: usize,
}

/// An invalid tree operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The node does not exist in this document.
    #[error("unknown node {0}")]
    UnknownNode(String),

    /// Inserting the node would make it its own ancestor.
    #[error("cannot insert {child} into {parent}: would create a cycle")]
    HierarchyCycle {
        /// The node being inserted.
        child: String,
        /// The intended parent.
        parent: String,
    },

    /// The operation needs an element.
    #[error("{0} is not an element")]
    NotAnElement(String),

    /// The reference node is not a child of the parent.
    #[error("{reference} is not a child of {parent}")]
    NotAChild {
        /// The reference node.
        reference: String,
        /// The parent node.
        parent: String,
    },

    /// The element already hosts a shadow root or cannot host one.
    #[error("cannot attach a shadow root to {0}")]
    ShadowRootUnsupported(String),

    /// A selector failed to parse.
    #[error(transparent)]
    Selector(#[from] SelectorError),
}
