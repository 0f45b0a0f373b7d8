use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};

use crate::env_file::write_secrets_file;
use crate::git_ops::{git_head_revision, run_git_clone, run_git_pull};
use macforge_core::{RepoBuild, StepOutcome, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageRuntime {
    Npm,
    UvTool,
}

impl PackageRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::UvTool => "uv tool",
        }
    }

    fn install_command(self, package: &str) -> Command {
        match self {
            Self::Npm => {
                let mut command = Command::new("npm");
                command.arg("install").arg("-g").arg(package);
                command
            }
            Self::UvTool => {
                let mut command = Command::new("uv");
                command.arg("tool").arg("install").arg(package);
                command
            }
        }
    }

    fn listing_command(self) -> Command {
        match self {
            Self::Npm => {
                let mut command = Command::new("npm");
                command
                    .arg("ls")
                    .arg("-g")
                    .arg("--depth=0")
                    .arg("--parseable");
                command
            }
            Self::UvTool => {
                let mut command = Command::new("uv");
                command.arg("tool").arg("list");
                command
            }
        }
    }
}

/// Whether the package manager's listing output names the package.
///
/// npm's parseable listing is one install path per line, ending in
/// `node_modules/<package>` (scoped packages keep their slash). uv's tool
/// listing leads each tool line with the package name followed by its
/// version.
pub fn package_listing_contains(runtime: PackageRuntime, listing: &str, package: &str) -> bool {
    match runtime {
        PackageRuntime::Npm => {
            let suffix = format!("node_modules/{package}");
            listing.lines().any(|line| line.trim_end().ends_with(&suffix))
        }
        PackageRuntime::UvTool => listing.lines().any(|line| {
            line.split_whitespace().next() == Some(package)
        }),
    }
}

/// Package-based integration install (install-if-missing, then verify via
/// the listing). Never escalates past a Failed outcome; a broken package
/// install must not stop the run.
pub fn install_packaged_integration(
    runtime: PackageRuntime,
    package: &str,
    display_name: &str,
) -> StepOutcome {
    install_packaged_integration_with_hooks(
        runtime,
        package,
        display_name,
        || {
            let mut command = runtime.install_command(package);
            let output = command
                .output()
                .with_context(|| format!("failed launching {} install", runtime.as_str()))?;
            if !output.status.success() {
                return Err(anyhow!(
                    "{} install of {} failed: {}",
                    runtime.as_str(),
                    package,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }
            Ok(())
        },
        || {
            let mut command = runtime.listing_command();
            let output = command
                .output()
                .with_context(|| format!("failed launching {} listing", runtime.as_str()))?;
            // npm ls exits non-zero over unrelated peer-dependency noise;
            // the listing itself is still usable.
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        },
    )
}

pub(crate) fn install_packaged_integration_with_hooks<InstallFn, ListingFn>(
    runtime: PackageRuntime,
    package: &str,
    display_name: &str,
    mut install: InstallFn,
    mut listing: ListingFn,
) -> StepOutcome
where
    InstallFn: FnMut() -> Result<()>,
    ListingFn: FnMut() -> Result<String>,
{
    let already_present = listing()
        .map(|raw| package_listing_contains(runtime, &raw, package))
        .unwrap_or(false);
    if already_present {
        return StepOutcome::new(display_name, StepStatus::AlreadyPresent, package);
    }

    if let Err(err) = install() {
        return StepOutcome::failed(display_name, format!("{err:#}"));
    }

    match listing() {
        Ok(raw) if package_listing_contains(runtime, &raw, package) => {
            StepOutcome::new(display_name, StepStatus::Installed, package)
        }
        Ok(_) => StepOutcome::failed(
            display_name,
            format!("{package} missing from {} listing after install", runtime.as_str()),
        ),
        Err(err) => StepOutcome::failed(display_name, format!("listing check failed: {err:#}")),
    }
}

/// Repository-based integration install (spec contract: update in place
/// when the clone exists, clone fresh otherwise, write the env file before
/// building, and leave a failed build's directory behind for the next run).
#[derive(Debug, Clone)]
pub struct RepoInstallRequest<'a> {
    pub repo_url: &'a str,
    pub install_dir: &'a Path,
    pub name: &'a str,
    /// File name inside `install_dir`.
    pub env_file: Option<&'a str>,
    pub env_content: Option<&'a str>,
    pub build: RepoBuild,
}

pub fn install_repo_integration(request: &RepoInstallRequest<'_>) -> Result<(StepStatus, String)> {
    install_repo_integration_with_hooks(
        request,
        |url, dir| run_git_clone(url, dir, request.name),
        |dir| run_git_pull(dir, request.name),
        |dir| run_build(dir, request.build),
        |dir| git_head_revision(dir, request.name),
    )
}

pub(crate) fn install_repo_integration_with_hooks<CloneFn, PullFn, BuildFn, RevisionFn>(
    request: &RepoInstallRequest<'_>,
    mut clone: CloneFn,
    mut pull: PullFn,
    mut build: BuildFn,
    mut revision: RevisionFn,
) -> Result<(StepStatus, String)>
where
    CloneFn: FnMut(&str, &Path) -> Result<()>,
    PullFn: FnMut(&Path) -> Result<()>,
    BuildFn: FnMut(&Path) -> Result<()>,
    RevisionFn: FnMut(&Path) -> Result<String>,
{
    let status = if request.install_dir.exists() {
        pull(request.install_dir)?;
        StepStatus::Upgraded
    } else {
        clone(request.repo_url, request.install_dir)?;
        StepStatus::Installed
    };

    if let (Some(env_file), Some(env_content)) = (request.env_file, request.env_content) {
        if !env_file.is_empty() && !env_content.is_empty() {
            write_secrets_file(&request.install_dir.join(env_file), env_content)?;
        }
    }

    build(request.install_dir)?;

    let head = revision(request.install_dir)?;
    Ok((status, head))
}

fn run_build(dir: &Path, build: RepoBuild) -> Result<()> {
    match build {
        RepoBuild::NpmBuild => {
            run_in_dir(dir, "npm", &["install"])?;
            run_in_dir(dir, "npm", &["run", "build", "--if-present"])
        }
        RepoBuild::UvSync => run_in_dir(dir, "uv", &["sync"]),
    }
}

fn run_in_dir(dir: &Path, program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| {
            format!("failed launching {program} {} in {}", args.join(" "), dir.display())
        })?;
    if !output.status.success() {
        return Err(anyhow!(
            "{program} {} failed in {}: {}",
            args.join(" "),
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
