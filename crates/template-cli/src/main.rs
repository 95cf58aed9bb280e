//! tmpl: check, compile and render component templates.

mod cli;
mod commands;
mod config;
mod error;
mod orchestrator;
mod output;
mod workspace;

use clap::Parser;
use cli::{Cli, Command};
use miette::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TMPL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check(args) => {
            let summary = orchestrator::run(args).await?;
            if summary.failed() {
                std::process::exit(1);
            }
        }
        Command::Compile(args) => print!("{}", commands::compile_command(&args)?),
        Command::Render(args) => println!("{}", commands::render_command(&args)?),
    }
    Ok(())
}
