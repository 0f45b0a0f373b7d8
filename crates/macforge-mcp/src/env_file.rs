use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

/// `KEY="value"` lines, sorted by key. Quotes and backslashes inside the
/// value are escaped so a credential containing either cannot break the
/// file's shape.
pub fn render_env_file(pairs: &BTreeMap<String, String>) -> String {
    let mut rendered = String::new();
    for (key, value) in pairs {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        rendered.push_str(&format!("{key}=\"{escaped}\"\n"));
    }
    rendered
}

/// OAuth client document in the shape Google's client libraries read from
/// `credentials.json`. Built as a value tree and serialized, never
/// templated.
pub fn render_oauth_client_json(client_id: &str, client_secret: &str) -> Result<String> {
    let document = json!({
        "installed": {
            "client_id": client_id,
            "client_secret": client_secret,
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"],
        }
    });
    let mut rendered =
        serde_json::to_string_pretty(&document).context("failed to serialize OAuth client document")?;
    rendered.push('\n');
    Ok(rendered)
}

/// Full overwrite; the previous contents are irrelevant by contract.
pub fn write_secrets_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .with_context(|| format!("failed to write secrets file: {}", path.display()))
}
