use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use semver::Version;

use crate::brew::Brew;
use crate::run::run_command;
use macforge_core::{meets_minimum, parse_lenient_version, StepOutcome, StepStatus};

const UV_FALLBACK_INSTALLER: &str = "curl -LsSf https://astral.sh/uv/install.sh | sh";

/// One ensure-step: a tool, the formula that provides it, and how to ask it
/// for its version.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub formula: &'static str,
    pub probe_command: &'static str,
    pub probe_args: &'static [&'static str],
    pub minimum: Option<Version>,
}

pub fn python_spec() -> ToolSpec {
    ToolSpec {
        name: "python",
        formula: "python@3.12",
        probe_command: "python3",
        probe_args: &["--version"],
        minimum: Some(Version::new(3, 11, 0)),
    }
}

pub fn git_spec() -> ToolSpec {
    ToolSpec {
        name: "git",
        formula: "git",
        probe_command: "git",
        probe_args: &["--version"],
        minimum: None,
    }
}

/// Runs the tool's version command and extracts a semver. Absent binary,
/// non-zero exit, and versionless output all read as "not present". Some
/// interpreters print the banner to stderr, so both streams are scanned.
pub fn probe_version(command: &str, args: &[&str]) -> Option<Version> {
    let output = Command::new(command).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push(' ');
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    parse_lenient_version(&combined).ok()
}

/// The ensure-step contract: absent installs, below-minimum upgrades, and
/// any installer failure degrades to whatever is present instead of
/// stopping the run.
pub fn ensure_tool(brew: &Brew, spec: &ToolSpec) -> (StepOutcome, Vec<String>) {
    ensure_tool_with_hooks(
        spec,
        || probe_version(spec.probe_command, spec.probe_args),
        |formula| brew.install_formula(formula),
        |formula| brew.upgrade_formula(formula),
    )
}

pub(crate) fn ensure_tool_with_hooks<ProbeFn, InstallFn, UpgradeFn>(
    spec: &ToolSpec,
    mut probe: ProbeFn,
    mut install: InstallFn,
    mut upgrade: UpgradeFn,
) -> (StepOutcome, Vec<String>)
where
    ProbeFn: FnMut() -> Option<Version>,
    InstallFn: FnMut(&str) -> Result<()>,
    UpgradeFn: FnMut(&str) -> Result<()>,
{
    let mut warnings = Vec::new();

    if let Some(present) = probe() {
        let meets = spec
            .minimum
            .as_ref()
            .map(|minimum| meets_minimum(&present, minimum))
            .unwrap_or(true);
        if meets {
            return (
                StepOutcome::new(spec.name, StepStatus::AlreadyPresent, present.to_string()),
                warnings,
            );
        }

        let minimum = spec.minimum.as_ref().map(Version::to_string).unwrap_or_default();
        if let Err(err) = upgrade(spec.formula) {
            warnings.push(format!(
                "{} {} is below minimum {} and the upgrade failed: {:#}; continuing with the installed version",
                spec.name, present, minimum, err
            ));
            return (
                StepOutcome::new(spec.name, StepStatus::AlreadyPresent, present.to_string()),
                warnings,
            );
        }

        return match probe() {
            Some(upgraded) => (
                StepOutcome::new(spec.name, StepStatus::Upgraded, upgraded.to_string()),
                warnings,
            ),
            None => (
                StepOutcome::failed(spec.name, "not runnable after upgrade"),
                warnings,
            ),
        };
    }

    if let Err(err) = install(spec.formula) {
        warnings.push(format!("{} install failed: {:#}", spec.name, err));
        return (
            StepOutcome::failed(spec.name, format!("install failed: {:#}", err)),
            warnings,
        );
    }

    match probe() {
        Some(installed) => (
            StepOutcome::new(spec.name, StepStatus::Installed, installed.to_string()),
            warnings,
        ),
        None => (
            StepOutcome::failed(spec.name, "not runnable after install"),
            warnings,
        ),
    }
}

/// nvm is a shell function, not a binary; every invocation goes through a
/// shell that sources the Homebrew-installed init script first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmEnv {
    init_script: PathBuf,
}

impl NvmEnv {
    pub fn new(init_script: impl Into<PathBuf>) -> Self {
        Self {
            init_script: init_script.into(),
        }
    }

    pub fn init_script(&self) -> &Path {
        &self.init_script
    }

    pub fn run(&self, args: &[&str]) -> Result<String> {
        let script = self.init_script.display();
        let joined = args.join(" ");
        let output = Command::new("/bin/zsh")
            .arg("-c")
            .arg(format!(
                "export NVM_DIR=\"$HOME/.nvm\"; [ -s \"{script}\" ] && . \"{script}\"; nvm {joined}"
            ))
            .output()
            .with_context(|| format!("failed launching nvm {joined}"))?;
        if !output.status.success() {
            return Err(anyhow!(
                "nvm {} failed: {}",
                joined,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Installs nvm if missing and proves the sourced function answers. An
/// unusable runtime manager leaves every Node-dependent step dead, so this
/// error is fatal to the run.
pub fn ensure_runtime_manager(brew: &Brew) -> Result<(NvmEnv, StepOutcome)> {
    let already = brew.formula_installed("nvm");
    if !already {
        brew.install_formula("nvm")
            .context("runtime manager install failed")?;
    }

    let prefix = brew.prefix_of("nvm")?;
    let nvm = NvmEnv::new(prefix.join("nvm.sh"));
    let version = nvm
        .run(&["--version"])
        .context("nvm is not usable after installation")?;

    let status = if already {
        StepStatus::AlreadyPresent
    } else {
        StepStatus::Installed
    };
    Ok((
        nvm,
        StepOutcome::new("nvm", status, version.trim().to_string()),
    ))
}

/// Ensures a Node at or above `minimum`, installing the `node_major` line
/// through nvm when needed. Node unusable after install is fatal.
pub fn ensure_node(nvm: &NvmEnv, node_major: u64, minimum: &Version) -> Result<StepOutcome> {
    let present = probe_version("node", &["--version"]);
    if let Some(version) = &present {
        if meets_minimum(version, minimum) {
            return Ok(StepOutcome::new(
                "node",
                StepStatus::AlreadyPresent,
                version.to_string(),
            ));
        }
    }

    let line = node_major.to_string();
    nvm.run(&["install", &line])
        .with_context(|| format!("nvm install {line} failed"))?;
    // Best effort; a missing default alias does not make Node unusable.
    let _ = nvm.run(&["alias", "default", &line]);

    let output = nvm
        .run(&["exec", "--silent", &line, "node", "--version"])
        .context("node is not runnable after nvm install")?;
    let installed =
        parse_lenient_version(&output).context("node produced no version after nvm install")?;

    let status = if present.is_some() {
        StepStatus::Upgraded
    } else {
        StepStatus::Installed
    };
    Ok(StepOutcome::new("node", status, installed.to_string()))
}

/// uv: Homebrew first, standalone installer as the one alternate method.
pub fn ensure_uv(brew: &Brew, home: &Path) -> (StepOutcome, Vec<String>) {
    let local_uv = home.join(".local").join("bin").join("uv");
    ensure_uv_with_hooks(
        move || {
            probe_version("uv", &["--version"])
                .or_else(|| probe_version(&local_uv.display().to_string(), &["--version"]))
        },
        || brew.install_formula("uv"),
        || {
            run_command(
                Command::new("/bin/sh").arg("-c").arg(UV_FALLBACK_INSTALLER),
                "uv standalone installer failed",
            )
        },
    )
}

pub(crate) fn ensure_uv_with_hooks<ProbeFn, BrewFn, FallbackFn>(
    mut probe: ProbeFn,
    mut brew_install: BrewFn,
    mut fallback_install: FallbackFn,
) -> (StepOutcome, Vec<String>)
where
    ProbeFn: FnMut() -> Option<Version>,
    BrewFn: FnMut() -> Result<()>,
    FallbackFn: FnMut() -> Result<()>,
{
    let mut warnings = Vec::new();

    if let Some(present) = probe() {
        return (
            StepOutcome::new("uv", StepStatus::AlreadyPresent, present.to_string()),
            warnings,
        );
    }

    if let Err(brew_err) = brew_install() {
        warnings.push(format!(
            "uv via Homebrew failed: {:#}; falling back to the standalone installer",
            brew_err
        ));
        if let Err(fallback_err) = fallback_install() {
            warnings.push(format!("uv standalone installer failed: {:#}", fallback_err));
            return (
                StepOutcome::failed("uv", "both install methods failed"),
                warnings,
            );
        }
    }

    match probe() {
        Some(installed) => (
            StepOutcome::new("uv", StepStatus::Installed, installed.to_string()),
            warnings,
        ),
        None => (
            StepOutcome::failed("uv", "not runnable after install"),
            warnings,
        ),
    }
}
