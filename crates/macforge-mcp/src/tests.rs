use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;

use super::*;
use crate::install::{
    install_packaged_integration_with_hooks, install_repo_integration_with_hooks,
};
use macforge_core::{RepoBuild, StepStatus};

static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

fn test_root(tag: &str) -> PathBuf {
    let sequence = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
    let root = std::env::temp_dir().join(format!(
        "macforge-mcp-{tag}-{}-{}",
        std::process::id(),
        sequence
    ));
    fs::create_dir_all(&root).expect("must create test root");
    root
}

fn pairs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn env_file_renders_sorted_quoted_lines() {
    let rendered = render_env_file(&pairs(&[
        ("GMAIL_REFRESH_TOKEN", "1//refresh"),
        ("GMAIL_CLIENT_ID", "client.apps.example"),
    ]));
    assert_eq!(
        rendered,
        "GMAIL_CLIENT_ID=\"client.apps.example\"\nGMAIL_REFRESH_TOKEN=\"1//refresh\"\n"
    );
}

#[test]
fn env_file_escapes_quotes_and_backslashes() {
    let rendered = render_env_file(&pairs(&[("KEY", "va\"lue\\with")]));
    assert_eq!(rendered, "KEY=\"va\\\"lue\\\\with\"\n");
}

#[test]
fn oauth_client_json_is_valid_and_nested() {
    let rendered = render_oauth_client_json("id-123.apps", "sec\"ret").expect("must render");
    let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("must be valid JSON");

    assert_eq!(parsed["installed"]["client_id"], "id-123.apps");
    assert_eq!(parsed["installed"]["client_secret"], "sec\"ret");
    assert_eq!(parsed["installed"]["redirect_uris"][0], "http://localhost");
}

#[test]
fn npm_listing_matches_scoped_packages() {
    let listing = "/opt/homebrew/lib\n/opt/homebrew/lib/node_modules/@modelcontextprotocol/server-slack\n/opt/homebrew/lib/node_modules/typescript\n";
    assert!(package_listing_contains(
        PackageRuntime::Npm,
        listing,
        "@modelcontextprotocol/server-slack"
    ));
    assert!(package_listing_contains(
        PackageRuntime::Npm,
        listing,
        "typescript"
    ));
    assert!(!package_listing_contains(
        PackageRuntime::Npm,
        listing,
        "@modelcontextprotocol/server-memory"
    ));
    // A name that is merely a suffix of another package must not match.
    assert!(!package_listing_contains(
        PackageRuntime::Npm,
        listing,
        "server-slack"
    ));
}

#[test]
fn uv_listing_matches_tool_lines_not_entrypoints() {
    let listing = "mcp-server-fetch v0.6.2\n- mcp-server-fetch\nmcp-server-sqlite v0.5.1\n- mcp-server-sqlite\n";
    assert!(package_listing_contains(
        PackageRuntime::UvTool,
        listing,
        "mcp-server-fetch"
    ));
    assert!(!package_listing_contains(
        PackageRuntime::UvTool,
        listing,
        "mcp-server-git"
    ));
}

#[test]
fn packaged_install_skips_when_already_listed() {
    let installs = Cell::new(0u32);

    let outcome = install_packaged_integration_with_hooks(
        PackageRuntime::Npm,
        "@modelcontextprotocol/server-memory",
        "Memory",
        || {
            installs.set(installs.get() + 1);
            Ok(())
        },
        || Ok("/lib/node_modules/@modelcontextprotocol/server-memory\n".to_string()),
    );

    assert_eq!(outcome.status, StepStatus::AlreadyPresent);
    assert_eq!(installs.get(), 0, "present package must not be reinstalled");
}

#[test]
fn packaged_install_installs_and_verifies() {
    let listed = Cell::new(false);

    let outcome = install_packaged_integration_with_hooks(
        PackageRuntime::UvTool,
        "mcp-server-fetch",
        "Fetch",
        || {
            listed.set(true);
            Ok(())
        },
        || {
            Ok(if listed.get() {
                "mcp-server-fetch v0.6.2\n".to_string()
            } else {
                String::new()
            })
        },
    );

    assert_eq!(outcome.status, StepStatus::Installed);
    assert_eq!(outcome.name, "Fetch");
}

#[test]
fn packaged_install_failure_is_warning_grade() {
    let outcome = install_packaged_integration_with_hooks(
        PackageRuntime::Npm,
        "@modelcontextprotocol/server-github",
        "GitHub",
        || Err(anyhow!("registry unreachable")),
        || Ok(String::new()),
    );

    assert_eq!(outcome.status, StepStatus::Failed);
    assert!(outcome.detail.contains("registry unreachable"));
}

#[test]
fn packaged_install_unverified_after_install_fails() {
    let outcome = install_packaged_integration_with_hooks(
        PackageRuntime::Npm,
        "@modelcontextprotocol/server-github",
        "GitHub",
        || Ok(()),
        || Ok(String::new()),
    );

    assert_eq!(outcome.status, StepStatus::Failed);
    assert!(outcome.detail.contains("missing from npm listing"));
}

#[test]
fn repo_install_clones_when_missing() {
    let root = test_root("clone");
    let install_dir = root.join("gmail");

    let request = RepoInstallRequest {
        repo_url: "https://example.com/repo.git",
        install_dir: &install_dir,
        name: "gmail",
        env_file: None,
        env_content: None,
        build: RepoBuild::NpmBuild,
    };

    let (status, revision) = install_repo_integration_with_hooks(
        &request,
        |url, dir| {
            assert_eq!(url, "https://example.com/repo.git");
            fs::create_dir_all(dir).expect("must create clone dir");
            Ok(())
        },
        |_| panic!("pull must not run for a fresh clone"),
        |_| Ok(()),
        |_| Ok("abc123def456".to_string()),
    )
    .expect("must install");

    assert_eq!(status, StepStatus::Installed);
    assert_eq!(revision, "abc123def456");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn repo_install_pulls_existing_clone_and_keeps_other_files() {
    let root = test_root("pull");
    let install_dir = root.join("gmail");
    fs::create_dir_all(&install_dir).expect("must create clone dir");
    fs::write(install_dir.join("scratch.txt"), "keep me").expect("must write unrelated file");

    let request = RepoInstallRequest {
        repo_url: "https://example.com/repo.git",
        install_dir: &install_dir,
        name: "gmail",
        env_file: Some(".env"),
        env_content: Some("GMAIL_CLIENT_ID=\"abc\"\n"),
        build: RepoBuild::NpmBuild,
    };

    let (status, _) = install_repo_integration_with_hooks(
        &request,
        |_, _| panic!("clone must not run when the directory exists"),
        |_| Ok(()),
        |_| Ok(()),
        |_| Ok("abc123def456".to_string()),
    )
    .expect("must update");

    assert_eq!(status, StepStatus::Upgraded);
    assert_eq!(
        fs::read_to_string(install_dir.join("scratch.txt")).expect("must read"),
        "keep me",
        "unrelated files must be untouched"
    );
    assert_eq!(
        fs::read_to_string(install_dir.join(".env")).expect("must read env"),
        "GMAIL_CLIENT_ID=\"abc\"\n"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn repo_install_overwrites_stale_env_file() {
    let root = test_root("env-overwrite");
    let install_dir = root.join("gmail");
    fs::create_dir_all(&install_dir).expect("must create clone dir");
    fs::write(install_dir.join(".env"), "OLD=\"stale\"\n").expect("must write stale env");

    let request = RepoInstallRequest {
        repo_url: "https://example.com/repo.git",
        install_dir: &install_dir,
        name: "gmail",
        env_file: Some(".env"),
        env_content: Some("NEW=\"fresh\"\n"),
        build: RepoBuild::NpmBuild,
    };

    install_repo_integration_with_hooks(
        &request,
        |_, _| Ok(()),
        |_| Ok(()),
        |_| Ok(()),
        |_| Ok("abc123def456".to_string()),
    )
    .expect("must update");

    assert_eq!(
        fs::read_to_string(install_dir.join(".env")).expect("must read env"),
        "NEW=\"fresh\"\n"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn repo_install_failed_build_leaves_directory_for_retry() {
    let root = test_root("build-fail");
    let install_dir = root.join("youtube");

    let request = RepoInstallRequest {
        repo_url: "https://example.com/repo.git",
        install_dir: &install_dir,
        name: "youtube",
        env_file: None,
        env_content: None,
        build: RepoBuild::NpmBuild,
    };

    let err = install_repo_integration_with_hooks(
        &request,
        |_, dir| {
            fs::create_dir_all(dir).expect("must create clone dir");
            Ok(())
        },
        |_| Ok(()),
        |_| Err(anyhow!("tsc exploded")),
        |_| Ok("abc123def456".to_string()),
    )
    .unwrap_err();

    assert!(err.to_string().contains("tsc exploded"));
    assert!(
        install_dir.is_dir(),
        "failed build must leave the clone for the next run"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn repo_install_skips_env_write_when_content_empty() {
    let root = test_root("env-empty");
    let install_dir = root.join("gcal");
    fs::create_dir_all(&install_dir).expect("must create clone dir");

    let request = RepoInstallRequest {
        repo_url: "https://example.com/repo.git",
        install_dir: &install_dir,
        name: "gcal",
        env_file: Some("credentials.json"),
        env_content: Some(""),
        build: RepoBuild::NpmBuild,
    };

    install_repo_integration_with_hooks(
        &request,
        |_, _| Ok(()),
        |_| Ok(()),
        |_| Ok(()),
        |_| Ok("abc123def456".to_string()),
    )
    .expect("must update");

    assert!(
        !install_dir.join("credentials.json").exists(),
        "empty content must not produce a secrets file"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn secrets_file_write_is_full_overwrite() {
    let root = test_root("secrets-overwrite");
    let path = root.join(".env");
    write_secrets_file(&path, "A=\"1\"\nB=\"2\"\n").expect("must write");
    write_secrets_file(&path, "C=\"3\"\n").expect("must overwrite");
    assert_eq!(fs::read_to_string(&path).expect("must read"), "C=\"3\"\n");
    let _ = fs::remove_dir_all(&root);
}
