use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Result};
use semver::Version;

use crate::run::{command_succeeds, run_command, run_command_capture};
use macforge_core::parse_lenient_version;

const INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

pub fn homebrew_prefix() -> &'static str {
    homebrew_prefix_for_arch(std::env::consts::ARCH)
}

/// Apple Silicon and Intel Macs keep Homebrew in different prefixes; the
/// original bottles would collide under Rosetta otherwise.
pub fn homebrew_prefix_for_arch(arch: &str) -> &'static str {
    match arch {
        "aarch64" => "/opt/homebrew",
        _ => "/usr/local",
    }
}

/// Handle on a usable `brew` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brew {
    binary: PathBuf,
}

impl Brew {
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Probes the arch-appropriate prefix first, then PATH.
    pub fn locate() -> Option<Self> {
        let prefixed = PathBuf::from(homebrew_prefix()).join("bin").join("brew");
        if command_succeeds(Command::new(&prefixed).arg("--version")) {
            return Some(Self { binary: prefixed });
        }
        if command_succeeds(Command::new("brew").arg("--version")) {
            return Some(Self {
                binary: PathBuf::from("brew"),
            });
        }
        None
    }

    /// Runs the official install script non-interactively.
    pub fn install() -> Result<()> {
        run_command(
            Command::new("/bin/bash")
                .arg("-c")
                .arg(format!("curl -fsSL {INSTALL_SCRIPT_URL} | /bin/bash"))
                .env("NONINTERACTIVE", "1"),
            "homebrew install script failed",
        )
    }

    pub fn version(&self) -> Result<Version> {
        let output = run_command_capture(
            Command::new(&self.binary).arg("--version"),
            "brew --version failed",
        )?;
        parse_lenient_version(&output)
    }

    pub fn install_formula(&self, formula: &str) -> Result<()> {
        run_command(
            Command::new(&self.binary).arg("install").arg(formula),
            &format!("brew install {formula} failed"),
        )
    }

    pub fn install_cask(&self, cask: &str) -> Result<()> {
        run_command(
            Command::new(&self.binary)
                .arg("install")
                .arg("--cask")
                .arg(cask),
            &format!("brew install --cask {cask} failed"),
        )
    }

    pub fn upgrade_formula(&self, formula: &str) -> Result<()> {
        run_command(
            Command::new(&self.binary).arg("upgrade").arg(formula),
            &format!("brew upgrade {formula} failed"),
        )
    }

    pub fn formula_installed(&self, formula: &str) -> bool {
        command_succeeds(
            Command::new(&self.binary)
                .arg("list")
                .arg("--formula")
                .arg(formula),
        )
    }

    /// `brew --prefix <formula>`: where formula payloads (e.g. nvm.sh)
    /// actually live.
    pub fn prefix_of(&self, formula: &str) -> Result<PathBuf> {
        let output = run_command_capture(
            Command::new(&self.binary).arg("--prefix").arg(formula),
            &format!("brew --prefix {formula} failed"),
        )?;
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("brew --prefix {formula} produced no path"));
        }
        Ok(PathBuf::from(trimmed))
    }
}
