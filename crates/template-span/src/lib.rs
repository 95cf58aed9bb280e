//! Source positions for template diagnostics.
//!
//! Compile errors point back into the template source. This crate provides the
//! byte [`Span`] every AST node carries and a [`LineIndex`] that turns byte
//! offsets into human-readable [`Position`]s.

mod position;
mod span;

pub use position::{LineIndex, Position};
pub use span::{ByteOffset, Span};
