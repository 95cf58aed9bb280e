//! CLI errors.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use template_compiler::CompileError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to read `{path}`")]
    #[diagnostic(code(tmpl::read))]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern: {0}")]
    #[diagnostic(code(tmpl::glob), help("patterns use globset syntax, e.g. `**/drafts/**`"))]
    InvalidGlob(String),

    #[error("invalid data file `{path}`: {message}")]
    #[diagnostic(code(tmpl::data))]
    InvalidData { path: Utf8PathBuf, message: String },

    #[error("`{path}` is not a template file")]
    #[diagnostic(code(tmpl::name), help("template files end in one of the configured extensions"))]
    NotATemplate { path: Utf8PathBuf },

    #[error("{path}:{}", .source.position)]
    #[diagnostic(code(tmpl::compile))]
    Compile {
        path: Utf8PathBuf,
        #[source]
        source: CompileError,
    },

    #[error("{0}")]
    #[diagnostic(code(tmpl::runtime))]
    Runtime(String),

    #[error("watch error: {0}")]
    #[diagnostic(code(tmpl::watch))]
    WatchFailed(String),
}
