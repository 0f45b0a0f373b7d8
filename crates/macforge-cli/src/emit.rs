use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use macforge_core::{ConsumerApp, IntegrationManifest, Launch};
use macforge_install::expand_home;
use macforge_secrets::Credentials;

/// One server invocation as the consuming applications expect it: a
/// command, its arguments, and the credential environment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServerEntry {
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct McpConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ServerEntry>,
}

/// Builds the invocation for one integration. Every embedded path is
/// derived from the live layout; nothing user-specific is hardcoded.
pub fn build_server_entry(
    manifest: &IntegrationManifest,
    home: &Path,
    servers_root: &Path,
    credentials: &Credentials,
) -> ServerEntry {
    let (command, args) = match manifest.launch {
        Launch::Npx { extra_args } => {
            let package = match manifest.method {
                macforge_core::InstallMethod::NpmPackage { package } => package,
                // Launch/method mismatches are rejected by catalog
                // validation; name is a harmless fallback for tests.
                _ => manifest.name,
            };
            let mut args = vec!["-y".to_string(), package.to_string()];
            args.extend(expand_args(home, extra_args));
            ("npx".to_string(), args)
        }
        Launch::Uvx { extra_args } => {
            let package = match manifest.method {
                macforge_core::InstallMethod::UvTool { package } => package,
                _ => manifest.name,
            };
            let mut args = vec![package.to_string()];
            args.extend(expand_args(home, extra_args));
            ("uvx".to_string(), args)
        }
        Launch::NodeDist { entry } => {
            let entry_path = servers_root.join(manifest.name).join(entry);
            ("node".to_string(), vec![entry_path.display().to_string()])
        }
    };

    ServerEntry {
        command,
        args,
        env: credentials.env_for(manifest.credentials),
    }
}

fn expand_args(home: &Path, args: &[&str]) -> Vec<String> {
    args.iter()
        .map(|arg| expand_home(home, arg).display().to_string())
        .collect()
}

/// One application's document: exactly the staged integrations that are
/// eligible for it, in stable name order.
pub fn build_app_config(
    app: ConsumerApp,
    staged: &BTreeMap<String, (IntegrationManifest, ServerEntry)>,
) -> McpConfig {
    let mcp_servers = staged
        .iter()
        .filter(|(_, (manifest, _))| manifest.eligible_for(app))
        .map(|(name, (_, entry))| (name.clone(), entry.clone()))
        .collect();
    McpConfig { mcp_servers }
}

/// Full-overwrite write; previous contents are irrelevant by contract.
pub fn write_config_document(path: &Path, config: &McpConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut rendered = serde_json::to_string_pretty(config)
        .context("failed to serialize server configuration")?;
    rendered.push('\n');
    fs::write(path, rendered)
        .with_context(|| format!("failed to write configuration: {}", path.display()))
}
