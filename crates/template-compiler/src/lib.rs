//! Template compiler.
//!
//! Turns bracketed template source into an [`Ast`]:
//! - [`StringScanner`] for cursor-based scanning of template text
//! - an expression lexer using `logos` and a parser for lisp-style and
//!   call-style helper calls
//! - a block-stack compiler for `if`, `each`, `rerender`, `guard`, partials
//!   and slots
//! - a [`TemplateCache`] for sharing compiled ASTs
//!
//! # Example
//!
//! ```
//! use template_compiler::{compile, TemplateNode};
//!
//! let ast = compile("{#if isOpen}<div class='content'>Open</div>{/if}").unwrap();
//! assert!(matches!(ast.nodes[0], TemplateNode::If(_)));
//! ```

mod ast;
mod cache;
mod error;
mod expression;
mod lexer;
mod markup;
mod parser;
mod scanner;

pub use ast::*;
pub use cache::{CacheKey, TemplateCache};
pub use error::{CompileError, CompileErrorKind};
pub use expression::{
    parse_expression, parse_named_args, Call, Expr, ExprError, Literal, NamedArg, ObjectEntry,
    Path,
};
pub use lexer::{tokenize, ExprToken, ExprTokenKind};
pub use scanner::StringScanner;
pub use template_span::{Position, Span};

/// Options for compiling templates.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Forces a dialect instead of detecting it from the source.
    pub dialect: Option<Dialect>,
}

/// Compiles a template source into an AST.
pub fn compile(source: &str) -> Result<Ast, CompileError> {
    compile_with_options(source, CompileOptions::default())
}

/// Compiles a template source with custom options.
pub fn compile_with_options(source: &str, options: CompileOptions) -> Result<Ast, CompileError> {
    parser::Compiler::new(source, &options).compile()
}

/// Detects the bracket dialect of a template source.
pub fn detect_dialect(source: &str) -> Dialect {
    parser::detect_dialect(source)
}
