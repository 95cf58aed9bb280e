//! End-to-end runs of the `tmpl` binary against temporary workspaces.

use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

#[derive(Debug, Deserialize)]
struct JsonDiagnostic {
    #[serde(rename = "type")]
    diagnostic_type: String,
    filename: String,
    start: JsonPosition,
    code: String,
}

#[derive(Debug, Deserialize)]
struct JsonPosition {
    line: u32,
    column: u32,
}

fn tmpl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tmpl"))
        .args(args)
        .env_remove("TMPL_LOG")
        .output()
        .expect("failed to run tmpl")
}

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_check_reports_errors_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "ok.tmpl", "<p>{> badge}</p>");
    write(root, "parts/badge.tmpl", "<b>{label}</b>");
    write(root, "broken.tmpl", "<ul>\n{#each items}<li>{/if}</ul>");
    write(root, "missing.tmpl", "{> nowhere}");

    let output = tmpl(&[
        "check",
        "--workspace",
        root.to_str().unwrap(),
        "--output",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let diagnostics: Vec<JsonDiagnostic> = serde_json::from_slice(&output.stdout).unwrap();
    let summary: Vec<(&str, &str, &str, u32, u32)> = diagnostics
        .iter()
        .map(|d| {
            (
                d.diagnostic_type.as_str(),
                d.filename.as_str(),
                d.code.as_str(),
                d.start.line,
                d.start.column,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Error", "broken.tmpl", "unbalanced-block", 2, 18),
            ("Warning", "missing.tmpl", "unknown-partial", 1, 1),
        ]
    );
}

#[test]
fn test_check_human_output_and_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "card.tmpl", "{> nowhere}");

    let output = tmpl(&["check", "--workspace", root.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("card.tmpl:1:1"));
    assert!(stdout.contains("tmpl found 0 errors and 1 warning in 1 file"));

    let strict = tmpl(&[
        "check",
        "--workspace",
        root.to_str().unwrap(),
        "--fail-on-warnings",
    ]);
    assert_eq!(strict.status.code(), Some(1));

    let ignored = tmpl(&[
        "check",
        "--workspace",
        root.to_str().unwrap(),
        "--ignore",
        "card.tmpl",
        "--fail-on-warnings",
    ]);
    assert_eq!(ignored.status.code(), Some(0));
}

#[test]
fn test_render_command() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "greeting.tmpl",
        "{#if name}Hello, {name}!{else}Hello!{/if}",
    );
    write(root, "data.json", r#"{"name": "<Ada>"}"#);

    let file = root.join("greeting.tmpl");
    let data = root.join("data.json");
    let output = tmpl(&[
        "render",
        file.to_str().unwrap(),
        "--data",
        data.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello, &lt;Ada&gt;!\n");

    let output = tmpl(&["render", file.to_str().unwrap()]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello!\n");
}

#[test]
fn test_compile_failure_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bad.tmpl");
    fs::write(&file, "{#if a}").unwrap();
    let output = tmpl(&["compile", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tmpl::compile"));
}
