use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;

pub const DEFAULT_VAULT: &str = "Provisioning";
pub const DEFAULT_NODE_MAJOR: u64 = 22;

/// Effective run configuration: built-in defaults overlaid with whatever the
/// optional config file provides. Every field has a usable default; the file
/// is strictly optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Secrets-manager vault the resolver reads from.
    pub vault: String,
    /// Release line handed to the runtime manager when Node must be installed.
    pub node_major: u64,
    /// Floor below which an installed Node triggers an install attempt.
    pub node_minimum: Version,
    /// Override for the clone root, `~/`-relative or absolute.
    pub servers_root: Option<String>,
    /// Integration names to skip entirely.
    pub disabled: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vault: DEFAULT_VAULT.to_string(),
            node_major: DEFAULT_NODE_MAJOR,
            node_minimum: Version::new(20, 0, 0),
            servers_root: None,
            disabled: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRunConfig {
    vault: Option<String>,
    node_major: Option<u64>,
    servers_root: Option<String>,
    disabled: Option<Vec<String>>,
}

impl RunConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: RawRunConfig = toml::from_str(input).context("failed to parse run config")?;
        let mut config = Self::default();
        if let Some(vault) = raw.vault {
            config.vault = vault;
        }
        if let Some(node_major) = raw.node_major {
            config.node_major = node_major;
        }
        config.servers_root = raw.servers_root;
        config.disabled = raw.disabled.unwrap_or_default();
        Ok(config)
    }

    /// Loads the config file if present. A missing file is the normal case
    /// and yields defaults silently; an unreadable or malformed file also
    /// yields defaults but returns a warning for the caller to log.
    pub fn load(path: &Path) -> (Self, Option<String>) {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return (Self::default(), None);
            }
            Err(err) => {
                return (
                    Self::default(),
                    Some(format!(
                        "could not read config {}: {}; using defaults",
                        path.display(),
                        err
                    )),
                );
            }
        };

        match Self::from_toml_str(&raw) {
            Ok(config) => (config, None),
            Err(err) => (
                Self::default(),
                Some(format!(
                    "could not parse config {}: {:#}; using defaults",
                    path.display(),
                    err
                )),
            ),
        }
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|entry| entry == name)
    }

    /// Disabled entries that name no catalog integration; surfaced as
    /// warnings, never errors.
    pub fn unknown_disabled<'a>(&'a self, known: &[&str]) -> Vec<&'a str> {
        self.disabled
            .iter()
            .map(String::as_str)
            .filter(|name| !known.contains(name))
            .collect()
    }
}
