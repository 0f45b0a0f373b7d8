use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed filesystem geometry for one user's machine. Every path the
/// provisioner reads or writes is derived here; nothing else hardcodes
/// locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineLayout {
    home: PathBuf,
}

impl MachineLayout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn from_env() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set; cannot resolve user paths")?;
        Ok(Self::new(home))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("Library").join("Logs").join("macforge")
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir().join("provision.log")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.home
            .join("Library")
            .join("Caches")
            .join("macforge")
            .join("downloads")
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.home
            .join(".config")
            .join("macforge")
            .join("config.toml")
    }

    /// Root for repository-based integration clones. `override_path` comes
    /// from the run config and may be `~/`-relative.
    pub fn servers_root(&self, override_path: Option<&str>) -> PathBuf {
        match override_path {
            Some(path) => expand_home(&self.home, path),
            None => self.home.join("mcp-servers"),
        }
    }

    pub fn server_dir(&self, servers_root: &Path, name: &str) -> PathBuf {
        servers_root.join(name)
    }

    pub fn claude_config_dir(&self) -> PathBuf {
        self.home
            .join("Library")
            .join("Application Support")
            .join("Claude")
    }

    pub fn claude_config_path(&self) -> PathBuf {
        self.claude_config_dir().join("claude_desktop_config.json")
    }

    pub fn cursor_dir(&self) -> PathBuf {
        self.home.join(".cursor")
    }

    pub fn cursor_config_path(&self) -> PathBuf {
        self.cursor_dir().join("mcp.json")
    }

    pub fn zprofile_path(&self) -> PathBuf {
        self.home.join(".zprofile")
    }

    pub fn zshrc_path(&self) -> PathBuf {
        self.home.join(".zshrc")
    }

    pub fn applications_dir(&self) -> PathBuf {
        PathBuf::from("/Applications")
    }

    pub fn bundle_path(&self, bundle_name: &str) -> PathBuf {
        self.applications_dir().join(bundle_name)
    }

    pub fn ensure_base_dirs(&self, servers_root: &Path) -> Result<()> {
        for dir in [
            self.log_dir(),
            self.downloads_dir(),
            self.claude_config_dir(),
            servers_root.to_path_buf(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Expands a leading `~/` against the given home directory; absolute and
/// bare relative paths pass through unchanged.
pub fn expand_home(home: &Path, path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}
