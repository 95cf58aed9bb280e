//! CLI argument parsing.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Checks, compiles and renders component templates.
#[derive(Debug, Parser)]
#[command(name = "tmpl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile every template under a workspace and report problems
    Check(CheckArgs),
    /// Compile one template and print its structure
    Compile(CompileArgs),
    /// Render one template to markup
    Render(RenderArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Working directory for the check
    #[arg(long, default_value = ".")]
    pub workspace: Utf8PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Watch mode
    #[arg(long)]
    pub watch: bool,

    /// Preserve watch output (don't clear screen)
    #[arg(long = "preserve-watch-output")]
    pub preserve_watch_output: bool,

    /// Exit with error on warnings
    #[arg(long = "fail-on-warnings")]
    pub fail_on_warnings: bool,

    /// Glob patterns to ignore
    #[arg(long)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Template file
    pub file: Utf8PathBuf,

    /// Print the AST as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Template file
    pub file: Utf8PathBuf,

    /// JSON file with the data to render against
    #[arg(long)]
    pub data: Option<Utf8PathBuf>,

    /// Directory searched for partials and `template.config.json`
    #[arg(long)]
    pub workspace: Option<Utf8PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_check_args() {
        let cli = Cli::parse_from(["tmpl", "check"]);
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.workspace.as_str(), ".");
        assert_eq!(args.output, OutputFormat::Human);
        assert!(!args.watch);
        assert!(args.ignore.is_empty());
    }

    #[test]
    fn test_check_flags() {
        let cli = Cli::parse_from([
            "tmpl",
            "check",
            "--workspace",
            "/srv/app",
            "--output",
            "json",
            "--watch",
            "--ignore",
            "**/legacy/**",
            "--ignore",
            "**/*.draft.tmpl",
        ]);
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.workspace.as_str(), "/srv/app");
        assert_eq!(args.output, OutputFormat::Json);
        assert!(args.watch);
        assert_eq!(args.ignore.len(), 2);
    }

    #[test]
    fn test_compile_and_render_args() {
        let cli = Cli::parse_from(["tmpl", "compile", "card.tmpl", "--json"]);
        assert!(matches!(cli.command, Command::Compile(CompileArgs { json: true, .. })));

        let cli = Cli::parse_from(["tmpl", "render", "card.tmpl", "--data", "card.json"]);
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.file.as_str(), "card.tmpl");
        assert_eq!(args.data.as_ref().map(|p| p.as_str()), Some("card.json"));
        assert!(args.workspace.is_none());
    }
}
