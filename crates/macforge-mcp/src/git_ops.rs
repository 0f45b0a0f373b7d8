use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

pub fn run_git_clone(repo_url: &str, destination: &Path, integration_name: &str) -> Result<()> {
    let output = Command::new("git")
        .arg("clone")
        .arg("--")
        .arg(repo_url)
        .arg(destination)
        .output()
        .with_context(|| {
            format!("integration '{integration_name}' failed launching git clone")
        })?;
    if !output.status.success() {
        anyhow::bail!(
            "integration '{}' git clone failed: {}",
            integration_name,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Update-in-place for an existing clone. Fast-forward only: a user's local
/// edits surface as an update failure rather than a surprise merge, and the
/// spec requires unrelated files in the directory to stay untouched.
pub fn run_git_pull(repo_root: &Path, integration_name: &str) -> Result<()> {
    let output = Command::new("git")
        .arg("pull")
        .arg("--ff-only")
        .current_dir(repo_root)
        .output()
        .with_context(|| {
            format!("integration '{integration_name}' failed launching git pull")
        })?;
    if !output.status.success() {
        anyhow::bail!(
            "integration '{}' git pull failed: {}",
            integration_name,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

pub fn git_head_revision(repo_root: &Path, integration_name: &str) -> Result<String> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("--short=12")
        .arg("HEAD")
        .current_dir(repo_root)
        .output()
        .with_context(|| {
            format!("integration '{integration_name}' failed launching git rev-parse")
        })?;
    if !output.status.success() {
        anyhow::bail!(
            "integration '{}' git rev-parse failed: {}",
            integration_name,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let revision = String::from_utf8(output.stdout)
        .context("git rev-parse produced non-UTF-8 output")?
        .trim()
        .to_string();
    if revision.is_empty() || !revision.chars().all(|ch| ch.is_ascii_hexdigit()) {
        anyhow::bail!(
            "integration '{}' git rev-parse returned an invalid HEAD revision: '{}'",
            integration_name,
            revision
        );
    }
    Ok(revision)
}
