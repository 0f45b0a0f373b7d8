use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{CommandFactory, ValueEnum};
use clap_complete::Shell;

use crate::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
}

impl From<CliCompletionShell> for Shell {
    fn from(value: CliCompletionShell) -> Self {
        match value {
            CliCompletionShell::Bash => Shell::Bash,
            CliCompletionShell::Zsh => Shell::Zsh,
            CliCompletionShell::Fish => Shell::Fish,
        }
    }
}

pub fn write_completions(shell: CliCompletionShell) -> Result<()> {
    let mut command = Cli::command();
    let generator: Shell = shell.into();
    let mut out = io::stdout().lock();
    clap_complete::generate(generator, &mut command, "macforge", &mut out);
    out.flush().context("failed writing completion script")?;
    Ok(())
}
