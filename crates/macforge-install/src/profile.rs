use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// A block of shell configuration plus the substring whose presence means
/// the block (or a hand-written equivalent) is already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnippet {
    pub guard: String,
    pub block: String,
}

pub fn brew_shellenv_snippet(prefix: &str) -> ProfileSnippet {
    ProfileSnippet {
        guard: format!("{prefix}/bin/brew shellenv"),
        block: format!("eval \"$({prefix}/bin/brew shellenv)\"\n"),
    }
}

pub fn nvm_init_snippet(nvm_prefix: &Path) -> ProfileSnippet {
    let script = nvm_prefix.join("nvm.sh");
    ProfileSnippet {
        guard: "NVM_DIR".to_string(),
        block: format!(
            "export NVM_DIR=\"$HOME/.nvm\"\n[ -s \"{script}\" ] && . \"{script}\"\n",
            script = script.display()
        ),
    }
}

/// Appends `snippet.block` to `path` unless `snippet.guard` already occurs
/// anywhere in the file. Returns whether anything was written; running the
/// provisioner twice must not duplicate profile lines.
pub fn append_once(path: &Path, snippet: &ProfileSnippet) -> Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read profile: {}", path.display()));
        }
    };

    if existing.contains(&snippet.guard) {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open profile for append: {}", path.display()))?;

    // Keep the appended block on its own lines even when the profile does
    // not end with a newline.
    if !existing.is_empty() && !existing.ends_with('\n') {
        file.write_all(b"\n")
            .with_context(|| format!("failed to append to profile: {}", path.display()))?;
    }
    file.write_all(snippet.block.as_bytes())
        .with_context(|| format!("failed to append to profile: {}", path.display()))?;

    Ok(true)
}
