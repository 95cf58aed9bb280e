//! The `check` command: compile every template and report problems.

use crate::cli::{CheckArgs, OutputFormat};
use crate::error::CliError;
use crate::output::{CheckSummary, FormattedDiagnostic, Formatter, Position, Severity};
use crate::workspace::Workspace;
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::time::Instant;
use template_compiler::{compile, walk, CompileError, CompileErrorKind, TemplateNode};
use template_span::{LineIndex, Span};

/// Runs the check once, or keeps re-running it in watch mode.
pub async fn run(args: CheckArgs) -> Result<CheckSummary, CliError> {
    let root = resolve_root(&args.workspace);
    let mut workspace = Workspace::open(&root, &args.ignore)?;

    if args.watch {
        run_watch_mode(&args, &mut workspace).await
    } else {
        Ok(run_single_check(&args, &workspace))
    }
}

/// Makes a relative workspace path absolute against the current directory.
pub fn resolve_root(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
        .map(|dir| dir.join(path))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Checks every template in the workspace and prints the report.
pub fn run_single_check(args: &CheckArgs, workspace: &Workspace) -> CheckSummary {
    let started = Instant::now();
    let known: BTreeSet<String> = workspace.partials().into_keys().collect();

    let diagnostics: Vec<FormattedDiagnostic> = workspace
        .files()
        .par_iter()
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(source) => Some(check_source(
                workspace.relative(path).as_str(),
                &source,
                &known,
            )),
            Err(error) => {
                tracing::warn!(%path, %error, "failed to read template");
                None
            }
        })
        .flatten()
        .collect();

    let summary = CheckSummary {
        file_count: workspace.files().len(),
        error_count: count(&diagnostics, Severity::Error),
        warning_count: count(&diagnostics, Severity::Warning),
        fail_on_warnings: args.fail_on_warnings,
    };

    let formatter = Formatter::new(args.output);
    match args.output {
        OutputFormat::Json => println!("{}", formatter.format(&diagnostics)),
        OutputFormat::Human => {
            print!("{}", formatter.format(&diagnostics));
            println!("{}", summary.format());
        }
    }
    tracing::debug!(
        files = summary.file_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "check finished"
    );
    summary
}

fn count(diagnostics: &[FormattedDiagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

/// Compiles one template source and reports errors and unknown partials.
pub fn check_source(
    filename: &str,
    source: &str,
    known_partials: &BTreeSet<String>,
) -> Vec<FormattedDiagnostic> {
    let ast = match compile(source) {
        Ok(ast) => ast,
        Err(error) => return vec![compile_diagnostic(filename, source, &error)],
    };

    let mut diagnostics = Vec::new();
    walk(&ast.nodes, &mut |node| {
        if let TemplateNode::Template(partial) = node {
            if !known_partials.contains(partial.name.as_str()) {
                diagnostics.push(diagnostic(
                    filename,
                    source,
                    partial.span,
                    Severity::Warning,
                    format!("unknown partial `{}`", partial.name),
                    "unknown-partial",
                ));
            }
        }
    });
    diagnostics
}

fn compile_diagnostic(filename: &str, source: &str, error: &CompileError) -> FormattedDiagnostic {
    let code = match error.kind {
        CompileErrorKind::MalformedTemplate { .. } => "malformed-template",
        CompileErrorKind::UnbalancedBlock { .. } => "unbalanced-block",
    };
    diagnostic(
        filename,
        source,
        error.span,
        Severity::Error,
        error.kind.to_string(),
        code,
    )
}

fn diagnostic(
    filename: &str,
    source: &str,
    span: Span,
    severity: Severity,
    message: String,
    code: &'static str,
) -> FormattedDiagnostic {
    let index = LineIndex::new(source);
    let position = |offset: usize| {
        let at = index.position(source, offset);
        Position {
            line: at.line,
            column: at.column,
            offset: offset as u32,
        }
    };
    FormattedDiagnostic {
        severity,
        filename: filename.to_string(),
        start: position(span.start_usize()),
        end: position(span.end_usize()),
        message,
        code,
    }
}

/// Runs in watch mode.
async fn run_watch_mode(
    args: &CheckArgs,
    workspace: &mut Workspace,
) -> Result<CheckSummary, CliError> {
    use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
    use std::time::Duration;

    println!("Starting watch mode...\n");
    run_single_check(args, workspace);

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default().with_poll_interval(Duration::from_secs(1)),
    )
    .map_err(|e| CliError::WatchFailed(e.to_string()))?;

    watcher
        .watch(workspace.root().as_std_path(), RecursiveMode::Recursive)
        .map_err(|e| CliError::WatchFailed(e.to_string()))?;

    println!("Watching for changes... (Ctrl+C to stop)\n");

    while let Some(event) = rx.recv().await {
        let relevant = event
            .paths
            .iter()
            .filter_map(|p| Utf8Path::from_path(p))
            .any(|p| workspace.is_relevant(p));
        if !relevant {
            continue;
        }
        if !args.preserve_watch_output {
            print!("\x1B[2J\x1B[1;1H");
        }
        println!("File changed, re-checking...\n");
        workspace.rescan();
        run_single_check(args, workspace);
    }

    Err(CliError::WatchFailed(
        "watch channel closed unexpectedly".to_string(),
    ))
}
