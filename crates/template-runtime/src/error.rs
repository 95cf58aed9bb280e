//! Runtime error types.

use dom_query::QueryError;
use dom_tree::{DomError, SelectorError};
use smol_str::SmolStr;
use template_compiler::CompileError;
use thiserror::Error;

/// A recoverable error raised while evaluating an expression.
///
/// The failing expression renders as empty; the error is logged and recorded
/// on the template instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// No method or helper with this name exists.
    #[error("unknown helper `{helper}` in `{expression}` (template `{template}`)")]
    UnknownHelper {
        /// The called name.
        helper: SmolStr,
        /// The template's debug name.
        template: SmolStr,
        /// The expression as written.
        expression: String,
    },

    /// A helper rejected its arguments.
    #[error("helper `{helper}` failed in `{expression}` (template `{template}`): {message}")]
    HelperFailed {
        /// The called helper.
        helper: SmolStr,
        /// The template's debug name.
        template: SmolStr,
        /// The expression as written.
        expression: String,
        /// The helper's message.
        message: String,
    },

    /// A partial tag names no known template.
    #[error("unknown partial `{partial}` (template `{template}`)")]
    UnknownPartial {
        /// The partial name.
        partial: SmolStr,
        /// The template's debug name.
        template: SmolStr,
    },

    /// An `each` block was given something other than an array or object.
    #[error("cannot iterate over {found} from `{expression}` (template `{template}`)")]
    NotIterable {
        /// The collection expression as written.
        expression: String,
        /// The template's debug name.
        template: SmolStr,
        /// The kind of value found.
        found: &'static str,
    },
}

/// A helper's rejection of its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HelperError(pub String);

impl HelperError {
    /// Creates a helper error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from defining, attaching and driving templates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// The template source failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// An event map key could not be parsed.
    #[error("invalid event binding `{spec}`: {message}")]
    InvalidEventBinding {
        /// The binding as written.
        spec: String,
        /// What went wrong.
        message: String,
    },

    /// A key map entry could not be parsed.
    #[error("invalid key binding `{spec}`: {message}")]
    InvalidKeyBinding {
        /// The binding as written.
        spec: String,
        /// What went wrong.
        message: String,
    },

    /// A selector in an event binding failed to parse.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// The template was already attached.
    #[error("template `{name}` is already attached")]
    AlreadyAttached {
        /// The template's debug name.
        name: SmolStr,
    },

    /// The operation needs a mounted template.
    #[error("template `{name}` is not attached")]
    NotAttached {
        /// The template's debug name.
        name: SmolStr,
    },

    /// The template was destroyed.
    #[error("template `{name}` was destroyed")]
    Destroyed {
        /// The template's debug name.
        name: SmolStr,
    },

    /// Inserting rendered nodes failed.
    #[error(transparent)]
    Dom(#[from] DomError),

    /// A query over the rendered nodes failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}
