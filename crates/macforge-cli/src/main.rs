mod completion;
mod dispatch;
mod emit;
mod logger;
mod render;
mod steps;

use anyhow::Result;
use clap::{Parser, Subcommand};

use completion::CliCompletionShell;

#[derive(Parser, Debug)]
#[command(name = "macforge")]
#[command(about = "macOS workstation provisioner for desktop AI integrations", long_about = None)]
struct Cli {
    /// Force plain, uncolored output.
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full provisioning sequence (the default when no subcommand
    /// is given).
    Run,
    /// Report detected tools and configuration without changing anything.
    Doctor,
    /// Write a shell completion script to stdout.
    Completions { shell: CliCompletionShell },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dispatch::run_cli(cli)
}

#[cfg(test)]
mod tests;
