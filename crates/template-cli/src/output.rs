//! Output formatting.

use crate::cli::OutputFormat;
use serde::Serialize;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A formatted diagnostic for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedDiagnostic {
    /// The diagnostic type (Error or Warning).
    #[serde(rename = "type")]
    pub severity: Severity,
    /// The file path, relative to the workspace.
    pub filename: String,
    pub start: Position,
    pub end: Position,
    pub message: String,
    /// Stable identifier, e.g. `unbalanced-block`.
    pub code: &'static str,
}

/// A position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number.
    pub column: u32,
    /// Byte offset.
    pub offset: u32,
}

/// Formats diagnostics for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a collection of diagnostics.
    pub fn format(&self, diagnostics: &[FormattedDiagnostic]) -> String {
        match self.format {
            OutputFormat::Human => Self::format_human(diagnostics),
            OutputFormat::Json => serde_json::to_string_pretty(diagnostics).unwrap_or_default(),
        }
    }

    fn format_human(diagnostics: &[FormattedDiagnostic]) -> String {
        let mut output = String::new();
        for diag in diagnostics {
            let severity = match diag.severity {
                Severity::Error => "Error",
                Severity::Warning => "Warning",
            };
            output.push_str(&format!(
                "{}:{}:{}\n{}: {} ({})\n\n",
                diag.filename, diag.start.line, diag.start.column, severity, diag.message, diag.code
            ));
        }
        output
    }
}

/// Summary of a check run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub file_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub fail_on_warnings: bool,
}

impl CheckSummary {
    /// Whether the run should exit with a failure status.
    pub fn failed(&self) -> bool {
        self.error_count > 0 || (self.fail_on_warnings && self.warning_count > 0)
    }

    /// Formats the summary line.
    pub fn format(&self) -> String {
        format!(
            "====================================\ntmpl found {} and {} in {}",
            plural(self.error_count, "error"),
            plural(self.warning_count, "warning"),
            plural(self.file_count, "file"),
        )
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}
