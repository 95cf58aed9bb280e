//! Compile error types.

use template_span::{LineIndex, Position, Span};
use thiserror::Error;

/// A fatal error raised while compiling a template.
///
/// Compilation never produces a partial AST: the first error aborts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {position}")]
pub struct CompileError {
    /// The kind of error.
    pub kind: CompileErrorKind,
    /// The offending source range.
    pub span: Span,
    /// Line and column of `span.start`.
    pub position: Position,
}

impl CompileError {
    /// Creates a new compile error, resolving the position from `source`.
    pub fn new(kind: CompileErrorKind, span: Span, source: &str) -> Self {
        Self {
            kind,
            span,
            position: LineIndex::position_of(source, span.start_usize()),
        }
    }

    /// Whether this is a malformed-template error.
    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, CompileErrorKind::MalformedTemplate { .. })
    }

    /// Whether this is an unbalanced-block error.
    pub fn is_unbalanced(&self) -> bool {
        matches!(self.kind, CompileErrorKind::UnbalancedBlock { .. })
    }
}

/// The kind of compile error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    /// Dialect conflicts, unterminated tags and invalid expressions.
    #[error("malformed template: {message}")]
    MalformedTemplate {
        /// A description of the problem.
        message: String,
    },

    /// Unclosed, mismatched or stray block tags.
    #[error("unbalanced block `{tag}`: {message}")]
    UnbalancedBlock {
        /// The offending tag as written, e.g. `{/each}`.
        tag: String,
        /// A description of the problem.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CompileError::new(
            CompileErrorKind::UnbalancedBlock {
                tag: "{/each}".to_string(),
                message: "expected {/if}".to_string(),
            },
            Span::from_usize(16, 23),
            "<p>\n{#if a}x</p>{/each}",
        );
        assert_eq!(
            error.to_string(),
            "unbalanced block `{/each}`: expected {/if} at 2:13"
        );
        assert!(error.is_unbalanced());
        assert!(!error.is_malformed());
    }
}
