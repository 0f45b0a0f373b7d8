use anyhow::Result;

use crate::completion::write_completions;
use crate::render::resolve_output_style;
use crate::steps::{run_doctor, run_provision};
use crate::{Cli, Commands};

pub fn run_cli(cli: Cli) -> Result<()> {
    let style = resolve_output_style(cli.plain);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_provision(style),
        Commands::Doctor => run_doctor(style),
        Commands::Completions { shell } => write_completions(shell),
    }
}
