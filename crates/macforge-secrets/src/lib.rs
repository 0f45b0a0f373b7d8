use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};

use macforge_core::CredentialRequest;

/// Value emitted for every credential once the resolver has been disabled
/// by a failed preflight. Distinct from the empty string a single missed
/// field produces while the resolver is healthy.
pub const PLACEHOLDER: &str = "REPLACE_ME";

const BREW_CASK: &str = "1password-cli";

/// Handle on a usable `op` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCli {
    binary: PathBuf,
}

impl OpCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn brew_cask() -> &'static str {
        BREW_CASK
    }

    /// Checks PATH and the usual Homebrew bin directories.
    pub fn locate() -> Option<Self> {
        for candidate in ["op", "/opt/homebrew/bin/op", "/usr/local/bin/op"] {
            let probe = Command::new(candidate).arg("--version").output();
            if probe.map(|output| output.status.success()).unwrap_or(false) {
                return Some(Self::new(candidate));
            }
        }
        None
    }

    pub fn version(&self) -> Result<String> {
        let output = self.capture(&["--version"])?;
        Ok(output.trim().to_string())
    }

    fn capture(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .with_context(|| format!("failed launching op {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "op {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Signed-in check: `op account get` answers for the active session.
    pub fn account_ready(&self) -> bool {
        self.capture(&["account", "get", "--format", "json"])
            .map(|raw| account_output_is_ready(&raw))
            .unwrap_or(false)
    }

    pub fn vault_exists(&self, vault: &str) -> bool {
        self.capture(&["vault", "get", vault, "--format", "json"])
            .map(|raw| vault_output_matches(&raw))
            .unwrap_or(false)
    }

    pub fn read_field(&self, vault: &str, item: &str, field: &str) -> Result<String> {
        let raw = self.capture(&[
            "item",
            "get",
            item,
            "--vault",
            vault,
            "--fields",
            &format!("label={field}"),
            "--reveal",
        ])?;
        Ok(parse_field_output(&raw))
    }
}

/// `op account get --format json` yields an object with the account id when
/// a session is live; anything else reads as signed-out.
pub(crate) fn account_output_is_ready(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .map(|id| !id.as_str().unwrap_or_default().is_empty())
        .unwrap_or(false)
}

pub(crate) fn vault_output_matches(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .map(|id| !id.as_str().unwrap_or_default().is_empty())
        .unwrap_or(false)
}

/// Field values come back as a bare line, sometimes quoted when the label
/// routing returns a single-field table.
pub(crate) fn parse_field_output(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    trimmed.to_string()
}

/// Best-effort credential lookups against one vault. A failed preflight
/// flips the resolver to disabled for the remainder of the run; lookups
/// then yield the placeholder without ever invoking the CLI again.
#[derive(Debug)]
pub struct SecretsResolver {
    backend: Option<OpCli>,
    vault: String,
    warnings: Vec<String>,
}

impl SecretsResolver {
    /// Runs the preflight chain: CLI present, session live, vault present.
    /// Never errors; a failure at any link yields a disabled resolver and a
    /// warning describing which link broke.
    pub fn preflight(cli: Option<OpCli>, vault: &str) -> Self {
        let Some(cli) = cli else {
            return Self::disabled_with_warning(
                vault,
                "secrets CLI is not installed; all credentials become placeholders",
            );
        };

        if !cli.account_ready() {
            return Self::disabled_with_warning(
                vault,
                "secrets CLI is not signed in; all credentials become placeholders",
            );
        }

        if !cli.vault_exists(vault) {
            return Self::disabled_with_warning(
                vault,
                &format!("vault '{vault}' not found; all credentials become placeholders"),
            );
        }

        Self {
            backend: Some(cli),
            vault: vault.to_string(),
            warnings: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_backend(cli: OpCli, vault: &str) -> Self {
        Self {
            backend: Some(cli),
            vault: vault.to_string(),
            warnings: Vec::new(),
        }
    }

    pub fn disabled(vault: &str) -> Self {
        Self {
            backend: None,
            vault: vault.to_string(),
            warnings: Vec::new(),
        }
    }

    fn disabled_with_warning(vault: &str, warning: &str) -> Self {
        Self {
            backend: None,
            vault: vault.to_string(),
            warnings: vec![warning.to_string()],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    pub fn backend(&self) -> Option<&OpCli> {
        self.backend.as_ref()
    }

    /// The field's value, the empty string on a miss, or the placeholder
    /// when the resolver is disabled. Never aborts the run.
    pub fn get_field(&mut self, item: &str, field: &str) -> String {
        let Some(cli) = &self.backend else {
            return PLACEHOLDER.to_string();
        };

        match cli.read_field(&self.vault, item, field) {
            Ok(value) if value.is_empty() => {
                self.warnings
                    .push(format!("item '{item}' field '{field}' is empty"));
                String::new()
            }
            Ok(value) => value,
            Err(err) => {
                self.warnings
                    .push(format!("item '{item}' field '{field}' lookup failed: {err:#}"));
                String::new()
            }
        }
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

/// Every credential the catalog asked for, resolved once up front and then
/// passed by reference to whatever emits configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<(String, String), String>,
}

impl Credentials {
    /// Resolves each distinct (item, field) pair exactly once, even when
    /// several integrations share a field.
    pub fn resolve(resolver: &mut SecretsResolver, requests: &[CredentialRequest]) -> Self {
        let mut values = BTreeMap::new();
        for request in requests {
            let key = (request.item.to_string(), request.field.to_string());
            if values.contains_key(&key) {
                continue;
            }
            let value = resolver.get_field(request.item, request.field);
            values.insert(key, value);
        }
        Self { values }
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, item: &str, field: &str, value: &str) {
        self.values
            .insert((item.to_string(), field.to_string()), value.to_string());
    }

    pub fn value(&self, item: &str, field: &str) -> &str {
        self.values
            .get(&(item.to_string(), field.to_string()))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All requested fields for one item are non-empty and non-placeholder.
    /// Used for the per-service all-or-nothing log line only; partial sets
    /// are still emitted.
    pub fn service_complete(&self, requests: &[CredentialRequest]) -> bool {
        requests.iter().all(|request| {
            let value = self.value(request.item, request.field);
            !value.is_empty() && value != PLACEHOLDER
        })
    }

    /// Environment map for one integration: env key → resolved value.
    pub fn env_for(&self, requests: &[CredentialRequest]) -> BTreeMap<String, String> {
        requests
            .iter()
            .map(|request| {
                (
                    request.env_key.to_string(),
                    self.value(request.item, request.field).to_string(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests;
