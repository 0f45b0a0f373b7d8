use std::collections::HashSet;

use anyhow::{anyhow, Result};

/// Desktop applications that consume the emitted server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerApp {
    ClaudeDesktop,
    Cursor,
}

impl ConsumerApp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeDesktop => "claude-desktop",
            Self::Cursor => "cursor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoBuild {
    /// `npm install` followed by `npm run build` inside the clone.
    NpmBuild,
    /// `uv sync` inside the clone.
    UvSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    /// Global install of a published npm package, verified via the npm
    /// global listing.
    NpmPackage { package: &'static str },
    /// `uv tool install`, verified via `uv tool list`.
    UvTool { package: &'static str },
    /// Clone-or-update of a source repository plus a fixed build command.
    GitClone {
        repo_url: &'static str,
        build: RepoBuild,
    },
}

impl InstallMethod {
    pub fn is_repo_based(self) -> bool {
        matches!(self, Self::GitClone { .. })
    }
}

/// One secret field to resolve: which vault item, which field label, and the
/// environment key the value is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialRequest {
    pub item: &'static str,
    pub field: &'static str,
    pub env_key: &'static str,
}

/// A secrets file written into a cloned repository before its build runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsFile {
    /// `KEY="value"` lines built from the integration's resolved credentials.
    DotEnv { file_name: &'static str },
    /// Nested OAuth client document (client_id/client_secret) in the shape
    /// Google's client libraries expect.
    OauthClientJson { file_name: &'static str },
}

impl SecretsFile {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::DotEnv { file_name } => file_name,
            Self::OauthClientJson { file_name } => file_name,
        }
    }
}

/// How the consuming application launches the server. Arguments beginning
/// with `~/` are expanded against the user's home by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    Npx { extra_args: &'static [&'static str] },
    Uvx { extra_args: &'static [&'static str] },
    /// `node <clone dir>/<entry>` for repository-based integrations.
    NodeDist { entry: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationManifest {
    pub name: &'static str,
    pub display_name: &'static str,
    pub method: InstallMethod,
    pub launch: Launch,
    pub consumers: &'static [ConsumerApp],
    pub credentials: &'static [CredentialRequest],
    pub secrets_file: Option<SecretsFile>,
}

impl IntegrationManifest {
    pub fn eligible_for(&self, app: ConsumerApp) -> bool {
        self.consumers.contains(&app)
    }
}

const BOTH_APPS: &[ConsumerApp] = &[ConsumerApp::ClaudeDesktop, ConsumerApp::Cursor];
const CLAUDE_ONLY: &[ConsumerApp] = &[ConsumerApp::ClaudeDesktop];

/// The fixed integration set. There is no dynamic registration; changing
/// this table is the only way to change what gets provisioned.
pub fn catalog() -> &'static [IntegrationManifest] {
    CATALOG
}

const CATALOG: &[IntegrationManifest] = &[
    IntegrationManifest {
        name: "filesystem",
        display_name: "Filesystem",
        method: InstallMethod::NpmPackage {
            package: "@modelcontextprotocol/server-filesystem",
        },
        launch: Launch::Npx {
            extra_args: &["~/Documents", "~/Desktop", "~/Downloads"],
        },
        consumers: BOTH_APPS,
        credentials: &[],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "memory",
        display_name: "Memory",
        method: InstallMethod::NpmPackage {
            package: "@modelcontextprotocol/server-memory",
        },
        launch: Launch::Npx { extra_args: &[] },
        consumers: BOTH_APPS,
        credentials: &[],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "puppeteer",
        display_name: "Puppeteer",
        method: InstallMethod::NpmPackage {
            package: "@modelcontextprotocol/server-puppeteer",
        },
        launch: Launch::Npx { extra_args: &[] },
        consumers: CLAUDE_ONLY,
        credentials: &[],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "brave-search",
        display_name: "Brave Search",
        method: InstallMethod::NpmPackage {
            package: "@modelcontextprotocol/server-brave-search",
        },
        launch: Launch::Npx { extra_args: &[] },
        consumers: BOTH_APPS,
        credentials: &[CredentialRequest {
            item: "Brave Search",
            field: "credential",
            env_key: "BRAVE_API_KEY",
        }],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "slack",
        display_name: "Slack",
        method: InstallMethod::NpmPackage {
            package: "@modelcontextprotocol/server-slack",
        },
        launch: Launch::Npx { extra_args: &[] },
        consumers: BOTH_APPS,
        credentials: &[
            CredentialRequest {
                item: "Slack",
                field: "bot_token",
                env_key: "SLACK_BOT_TOKEN",
            },
            CredentialRequest {
                item: "Slack",
                field: "team_id",
                env_key: "SLACK_TEAM_ID",
            },
        ],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "github",
        display_name: "GitHub",
        method: InstallMethod::NpmPackage {
            package: "@modelcontextprotocol/server-github",
        },
        launch: Launch::Npx { extra_args: &[] },
        consumers: BOTH_APPS,
        credentials: &[CredentialRequest {
            item: "GitHub",
            field: "token",
            env_key: "GITHUB_PERSONAL_ACCESS_TOKEN",
        }],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "notion",
        display_name: "Notion",
        method: InstallMethod::NpmPackage {
            package: "@notionhq/notion-mcp-server",
        },
        launch: Launch::Npx { extra_args: &[] },
        consumers: BOTH_APPS,
        credentials: &[CredentialRequest {
            item: "Notion",
            field: "token",
            env_key: "NOTION_TOKEN",
        }],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "fetch",
        display_name: "Fetch",
        method: InstallMethod::UvTool {
            package: "mcp-server-fetch",
        },
        launch: Launch::Uvx { extra_args: &[] },
        consumers: BOTH_APPS,
        credentials: &[],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "sqlite",
        display_name: "SQLite",
        method: InstallMethod::UvTool {
            package: "mcp-server-sqlite",
        },
        launch: Launch::Uvx {
            extra_args: &["--db-path", "~/mcp-servers/data/sqlite.db"],
        },
        consumers: CLAUDE_ONLY,
        credentials: &[],
        secrets_file: None,
    },
    IntegrationManifest {
        name: "gmail",
        display_name: "Gmail",
        method: InstallMethod::GitClone {
            repo_url: "https://github.com/GongRzhe/Gmail-MCP-Server.git",
            build: RepoBuild::NpmBuild,
        },
        launch: Launch::NodeDist {
            entry: "dist/index.js",
        },
        consumers: CLAUDE_ONLY,
        credentials: &[
            CredentialRequest {
                item: "Google OAuth",
                field: "client_id",
                env_key: "GMAIL_CLIENT_ID",
            },
            CredentialRequest {
                item: "Google OAuth",
                field: "client_secret",
                env_key: "GMAIL_CLIENT_SECRET",
            },
            CredentialRequest {
                item: "Gmail",
                field: "refresh_token",
                env_key: "GMAIL_REFRESH_TOKEN",
            },
        ],
        secrets_file: Some(SecretsFile::DotEnv { file_name: ".env" }),
    },
    IntegrationManifest {
        name: "google-calendar",
        display_name: "Google Calendar",
        method: InstallMethod::GitClone {
            repo_url: "https://github.com/nspady/google-calendar-mcp.git",
            build: RepoBuild::NpmBuild,
        },
        launch: Launch::NodeDist {
            entry: "build/index.js",
        },
        consumers: CLAUDE_ONLY,
        credentials: &[
            CredentialRequest {
                item: "Google OAuth",
                field: "client_id",
                env_key: "GOOGLE_CLIENT_ID",
            },
            CredentialRequest {
                item: "Google OAuth",
                field: "client_secret",
                env_key: "GOOGLE_CLIENT_SECRET",
            },
        ],
        secrets_file: Some(SecretsFile::OauthClientJson {
            file_name: "credentials.json",
        }),
    },
    IntegrationManifest {
        name: "youtube",
        display_name: "YouTube",
        method: InstallMethod::GitClone {
            repo_url: "https://github.com/anaisbetts/mcp-youtube.git",
            build: RepoBuild::NpmBuild,
        },
        launch: Launch::NodeDist {
            entry: "lib/index.mjs",
        },
        consumers: CLAUDE_ONLY,
        credentials: &[],
        secrets_file: None,
    },
];

/// Structural invariants the emitter and installers rely on. Checked by
/// tests rather than at runtime; the table is compile-time data.
pub fn validate_catalog(entries: &[IntegrationManifest]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(anyhow!("integration name must not be empty"));
        }
        if !seen.insert(entry.name) {
            return Err(anyhow!("duplicate integration name: {}", entry.name));
        }
        if entry.consumers.is_empty() {
            return Err(anyhow!(
                "integration '{}' has no consuming application",
                entry.name
            ));
        }
        for request in entry.credentials {
            if request.item.trim().is_empty()
                || request.field.trim().is_empty()
                || request.env_key.trim().is_empty()
            {
                return Err(anyhow!(
                    "integration '{}' has an incomplete credential request",
                    entry.name
                ));
            }
        }
        if entry.secrets_file.is_some() && !entry.method.is_repo_based() {
            return Err(anyhow!(
                "integration '{}' declares a secrets file without a clone directory to hold it",
                entry.name
            ));
        }
        if entry.secrets_file.is_some() && entry.credentials.is_empty() {
            return Err(anyhow!(
                "integration '{}' declares a secrets file but no credential fields",
                entry.name
            ));
        }
        if matches!(entry.launch, Launch::NodeDist { .. }) && !entry.method.is_repo_based() {
            return Err(anyhow!(
                "integration '{}' launches from a clone directory it never creates",
                entry.name
            ));
        }
    }
    Ok(())
}
