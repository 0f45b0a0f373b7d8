use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;

use crate::emit::{build_app_config, build_server_entry, write_config_document, McpConfig, ServerEntry};
use crate::logger::format_log_line;
use crate::render::{render_status_line, resolve_output_style, OutputStyle};
use crate::steps::{format_summary_lines, outcome_line};
use crate::{Cli, Commands};
use macforge_core::{catalog, ConsumerApp, IntegrationManifest, StepOutcome, StepReport, StepStatus};
use macforge_secrets::{Credentials, SecretsResolver, PLACEHOLDER};

static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

fn test_root(tag: &str) -> PathBuf {
    let sequence = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
    let root = std::env::temp_dir().join(format!(
        "macforge-cli-{tag}-{}-{}",
        std::process::id(),
        sequence
    ));
    fs::create_dir_all(&root).expect("must create test root");
    root
}

fn manifest(name: &str) -> &'static IntegrationManifest {
    catalog()
        .iter()
        .find(|entry| entry.name == name)
        .expect("integration must exist in catalog")
}

fn staged_all() -> BTreeMap<String, (IntegrationManifest, ServerEntry)> {
    let credentials = Credentials::default();
    catalog()
        .iter()
        .map(|entry| {
            let server_entry = build_server_entry(
                entry,
                Path::new("/Users/dev"),
                Path::new("/Users/dev/mcp-servers"),
                &credentials,
            );
            (entry.name.to_string(), (*entry, server_entry))
        })
        .collect()
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "node: already-present (22.11.0)"),
        "node: already-present (22.11.0)"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "node: installed (22.11.0)"),
        "[OK] node: installed (22.11.0)"
    );
}

#[test]
fn render_status_line_rich_formats_warning() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "Slack credentials incomplete"),
        "[WARN] Slack credentials incomplete"
    );
}

#[test]
fn forced_plain_style_wins() {
    assert_eq!(resolve_output_style(true), OutputStyle::Plain);
}

#[test]
fn log_line_shape_is_stable() {
    assert_eq!(
        format_log_line("2026-08-07 10:15:02", "WARN", "uv install failed"),
        "[2026-08-07 10:15:02] WARN  uv install failed"
    );
}

#[test]
fn outcome_line_omits_empty_detail() {
    assert_eq!(
        outcome_line(&StepOutcome::new("node", StepStatus::Installed, "22.11.0")),
        "node: installed (22.11.0)"
    );
    assert_eq!(
        outcome_line(&StepOutcome::new("node", StepStatus::Installed, "")),
        "node: installed"
    );
}

#[test]
fn summary_reports_degraded_count() {
    let mut report = StepReport::new();
    report.record(StepOutcome::new("homebrew", StepStatus::AlreadyPresent, "4.3.9"));
    report.record(StepOutcome::failed("Gmail", "clone failed"));

    let lines = format_summary_lines(&report);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("homebrew"));
    assert!(lines[2].contains("1 step(s) degraded"));

    let clean = StepReport::new();
    assert_eq!(format_summary_lines(&clean), vec!["all steps completed".to_string()]);
}

#[test]
fn npx_entry_expands_home_relative_args() {
    let entry = build_server_entry(
        manifest("filesystem"),
        Path::new("/Users/dev"),
        Path::new("/Users/dev/mcp-servers"),
        &Credentials::default(),
    );

    assert_eq!(entry.command, "npx");
    assert_eq!(
        entry.args,
        vec![
            "-y",
            "@modelcontextprotocol/server-filesystem",
            "/Users/dev/Documents",
            "/Users/dev/Desktop",
            "/Users/dev/Downloads",
        ]
    );
    assert!(entry.env.is_empty());
}

#[test]
fn uvx_entry_carries_package_and_extra_args() {
    let entry = build_server_entry(
        manifest("sqlite"),
        Path::new("/Users/dev"),
        Path::new("/Users/dev/mcp-servers"),
        &Credentials::default(),
    );

    assert_eq!(entry.command, "uvx");
    assert_eq!(
        entry.args,
        vec![
            "mcp-server-sqlite",
            "--db-path",
            "/Users/dev/mcp-servers/data/sqlite.db",
        ]
    );
}

#[test]
fn node_entry_points_into_servers_root() {
    let entry = build_server_entry(
        manifest("gmail"),
        Path::new("/Users/dev"),
        Path::new("/Users/dev/mcp-servers"),
        &Credentials::default(),
    );

    assert_eq!(entry.command, "node");
    assert_eq!(entry.args, vec!["/Users/dev/mcp-servers/gmail/dist/index.js"]);
    // Credential env keys are present even when unresolved; values default
    // to empty strings.
    assert_eq!(entry.env.get("GMAIL_CLIENT_ID").map(String::as_str), Some(""));
}

#[test]
fn placeholder_credentials_flow_into_env() {
    let mut resolver = SecretsResolver::disabled("Provisioning");
    let slack = manifest("slack");
    let credentials = Credentials::resolve(&mut resolver, slack.credentials);

    let entry = build_server_entry(
        slack,
        Path::new("/Users/dev"),
        Path::new("/Users/dev/mcp-servers"),
        &credentials,
    );

    assert_eq!(
        entry.env.get("SLACK_BOT_TOKEN").map(String::as_str),
        Some(PLACEHOLDER)
    );
    assert_eq!(
        entry.env.get("SLACK_TEAM_ID").map(String::as_str),
        Some(PLACEHOLDER)
    );
}

#[test]
fn app_configs_carry_exactly_the_eligible_keys() {
    let staged = staged_all();

    let claude = build_app_config(ConsumerApp::ClaudeDesktop, &staged);
    let claude_keys: Vec<&str> = claude.mcp_servers.keys().map(String::as_str).collect();
    assert_eq!(claude_keys.len(), 12, "claude receives the whole catalog");

    let cursor = build_app_config(ConsumerApp::Cursor, &staged);
    let cursor_keys: Vec<&str> = cursor.mcp_servers.keys().map(String::as_str).collect();
    assert_eq!(
        cursor_keys,
        vec![
            "brave-search",
            "fetch",
            "filesystem",
            "github",
            "memory",
            "notion",
            "slack",
        ]
    );
}

#[test]
fn unstaged_integrations_stay_out_of_the_document() {
    let mut staged = staged_all();
    staged.remove("gmail");
    staged.remove("slack");

    let claude = build_app_config(ConsumerApp::ClaudeDesktop, &staged);
    assert!(!claude.mcp_servers.contains_key("gmail"));
    assert!(!claude.mcp_servers.contains_key("slack"));
    assert!(claude.mcp_servers.contains_key("filesystem"));
}

#[test]
fn written_document_is_valid_json_with_mcp_servers_root() {
    let root = test_root("emit");
    let path = root.join("claude_desktop_config.json");

    let staged = staged_all();
    let config = build_app_config(ConsumerApp::ClaudeDesktop, &staged);
    write_config_document(&path, &config).expect("must write");

    let raw = fs::read_to_string(&path).expect("must read");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("must be valid JSON");
    let servers = parsed["mcpServers"].as_object().expect("must be an object");
    assert_eq!(servers.len(), 12);
    assert_eq!(servers["filesystem"]["command"], "npx");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn credential_values_with_quotes_survive_serialization() {
    let root = test_root("emit-escape");
    let path = root.join("config.json");

    let mut env = BTreeMap::new();
    env.insert(
        "GITHUB_PERSONAL_ACCESS_TOKEN".to_string(),
        "ghp_\"quoted\"\\backslash".to_string(),
    );
    let mut mcp_servers = BTreeMap::new();
    mcp_servers.insert(
        "github".to_string(),
        ServerEntry {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "@modelcontextprotocol/server-github".to_string()],
            env,
        },
    );

    write_config_document(&path, &McpConfig { mcp_servers }).expect("must write");

    let raw = fs::read_to_string(&path).expect("must read");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("must stay valid JSON");
    assert_eq!(
        parsed["mcpServers"]["github"]["env"]["GITHUB_PERSONAL_ACCESS_TOKEN"],
        "ghp_\"quoted\"\\backslash"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn document_write_is_full_overwrite() {
    let root = test_root("emit-overwrite");
    let path = root.join("config.json");
    fs::write(&path, "{\"mcpServers\":{\"stale\":{}}}").expect("must write stale document");

    write_config_document(&path, &McpConfig::default()).expect("must overwrite");

    let raw = fs::read_to_string(&path).expect("must read");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("must be valid JSON");
    assert!(parsed["mcpServers"].as_object().expect("object").is_empty());
    assert!(!raw.contains("stale"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn empty_env_is_omitted_from_the_document() {
    let staged = staged_all();
    let config = build_app_config(ConsumerApp::ClaudeDesktop, &staged);
    let rendered = serde_json::to_string_pretty(&config).expect("must serialize");
    let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("must parse");

    assert!(parsed["mcpServers"]["memory"].get("env").is_none());
    assert!(parsed["mcpServers"]["slack"].get("env").is_some());
}

#[test]
fn bare_invocation_defaults_to_run() {
    let cli = Cli::try_parse_from(["macforge"]).expect("must parse");
    assert!(cli.command.is_none());
    assert!(!cli.plain);
}

#[test]
fn subcommands_parse() {
    let cli = Cli::try_parse_from(["macforge", "doctor"]).expect("must parse");
    assert!(matches!(cli.command, Some(Commands::Doctor)));

    let cli = Cli::try_parse_from(["macforge", "--plain", "run"]).expect("must parse");
    assert!(cli.plain);
    assert!(matches!(cli.command, Some(Commands::Run)));

    let cli = Cli::try_parse_from(["macforge", "completions", "zsh"]).expect("must parse");
    assert!(matches!(cli.command, Some(Commands::Completions { .. })));
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["macforge", "uninstall"]).is_err());
}
