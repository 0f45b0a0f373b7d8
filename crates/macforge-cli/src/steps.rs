use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::emit::{build_app_config, build_server_entry, write_config_document, ServerEntry};
use crate::logger::RunLog;
use crate::render::{OutputStyle, TerminalRenderer};
use macforge_core::{
    catalog, ConsumerApp, InstallMethod, IntegrationManifest, RunConfig, SecretsFile, StepOutcome,
    StepReport, StepStatus,
};
use macforge_install::{
    append_once, brew_shellenv_snippet, ensure_node, ensure_runtime_manager, ensure_tool,
    ensure_uv, git_spec, homebrew_prefix, install_desktop_app, nvm_init_snippet, probe_version,
    python_spec, Brew, MachineLayout, CLAUDE_DESKTOP,
};
use macforge_mcp::{
    install_packaged_integration, install_repo_integration, render_env_file,
    render_oauth_client_json, PackageRuntime, RepoInstallRequest,
};
use macforge_secrets::{Credentials, OpCli, SecretsResolver};

struct Driver {
    renderer: TerminalRenderer,
    log: RunLog,
    report: StepReport,
}

impl Driver {
    fn section(&mut self, title: &str) {
        self.renderer.print_section(title);
        self.log.line("INFO", &format!("== {title}"));
    }

    fn info(&mut self, message: &str) {
        self.renderer.print_status("step", message);
        self.log.line("INFO", message);
    }

    fn ok(&mut self, message: &str) {
        self.renderer.print_status("ok", message);
        self.log.line("INFO", message);
    }

    fn warn(&mut self, message: &str) {
        self.renderer.print_status("warn", message);
        self.log.line("WARN", message);
    }

    fn warn_all(&mut self, warnings: &[String]) {
        for warning in warnings {
            self.warn(warning);
        }
    }

    fn fatal(&mut self, message: &str) {
        self.renderer.print_status("err", message);
        self.log.line("FATAL", message);
    }

    fn record(&mut self, outcome: StepOutcome) {
        let message = outcome_line(&outcome);
        match outcome.status {
            StepStatus::Failed => {
                self.renderer.print_status("err", &message);
                self.log.line("ERROR", &message);
            }
            StepStatus::Skipped => {
                self.renderer.print_status("step", &message);
                self.log.line("INFO", &message);
            }
            _ => {
                self.renderer.print_status("ok", &message);
                self.log.line("INFO", &message);
            }
        }
        self.report.record(outcome);
    }
}

pub(crate) fn outcome_line(outcome: &StepOutcome) -> String {
    if outcome.detail.is_empty() {
        format!("{}: {}", outcome.name, outcome.status.as_str())
    } else {
        format!(
            "{}: {} ({})",
            outcome.name,
            outcome.status.as_str(),
            outcome.detail
        )
    }
}

pub(crate) fn format_summary_lines(report: &StepReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.outcomes().len() + 1);
    for outcome in report.outcomes() {
        lines.push(format!(
            "{:<18} {:<15} {}",
            outcome.name,
            outcome.status.as_str(),
            outcome.detail
        ));
    }
    let failed = report.failed_count();
    if failed == 0 {
        lines.push("all steps completed".to_string());
    } else {
        lines.push(format!(
            "{failed} step(s) degraded; affected features are unconfigured or using placeholders"
        ));
    }
    lines
}

/// The full provisioning sequence. Only an unusable package manager or
/// runtime (Homebrew, nvm, Node) aborts; every other failure records a
/// degraded outcome and the run continues to the summary.
pub fn run_provision(style: OutputStyle) -> Result<()> {
    let renderer = TerminalRenderer::from_style(style);
    let layout = MachineLayout::from_env()?;

    let (config, config_warning) = RunConfig::load(&layout.config_file_path());
    let servers_root = layout.servers_root(config.servers_root.as_deref());
    layout
        .ensure_base_dirs(&servers_root)
        .context("could not create base directories")?;

    let (log, log_warning) = RunLog::open(&layout.log_file_path());
    let mut driver = Driver {
        renderer,
        log,
        report: StepReport::new(),
    };

    driver.log.line("INFO", "provisioning run started");
    if let Some(warning) = config_warning {
        driver.warn(&warning);
    }
    if let Some(warning) = log_warning {
        driver.warn(&warning);
    }

    let known_names: Vec<&str> = catalog().iter().map(|entry| entry.name).collect();
    for unknown in config.unknown_disabled(&known_names) {
        driver.warn(&format!(
            "config disables unknown integration '{unknown}'; ignoring"
        ));
    }

    driver.section("Toolchain");
    driver.info(&format!(
        "architecture {} (package manager prefix {})",
        std::env::consts::ARCH,
        homebrew_prefix()
    ));

    let brew = match ensure_homebrew(&mut driver) {
        Ok(brew) => brew,
        Err(err) => {
            driver.fatal(&format!("{err:#}"));
            return Err(err);
        }
    };

    match append_once(
        &layout.zprofile_path(),
        &brew_shellenv_snippet(homebrew_prefix()),
    ) {
        Ok(true) => driver.ok("added brew shellenv to ~/.zprofile"),
        Ok(false) => driver.info("brew shellenv already present in ~/.zprofile"),
        Err(err) => driver.warn(&format!("could not update ~/.zprofile: {err:#}")),
    }

    let nvm = match ensure_runtime_manager(&brew) {
        Ok((nvm, outcome)) => {
            driver.record(outcome);
            nvm
        }
        Err(err) => {
            driver.fatal(&format!("runtime manager unusable: {err:#}"));
            return Err(err);
        }
    };

    if let Some(nvm_prefix) = nvm.init_script().parent() {
        match append_once(&layout.zshrc_path(), &nvm_init_snippet(nvm_prefix)) {
            Ok(true) => driver.ok("added nvm init to ~/.zshrc"),
            Ok(false) => driver.info("nvm init already present in ~/.zshrc"),
            Err(err) => driver.warn(&format!("could not update ~/.zshrc: {err:#}")),
        }
    }

    match ensure_node(&nvm, config.node_major, &config.node_minimum) {
        Ok(outcome) => driver.record(outcome),
        Err(err) => {
            driver.fatal(&format!("node unusable: {err:#}"));
            return Err(err);
        }
    }

    for spec in [git_spec(), python_spec()] {
        let (outcome, warnings) = ensure_tool(&brew, &spec);
        driver.warn_all(&warnings);
        driver.record(outcome);
    }

    let (outcome, warnings) = ensure_uv(&brew, layout.home());
    driver.warn_all(&warnings);
    driver.record(outcome);

    driver.section("Desktop application");
    let mut progress = driver.renderer.start_byte_progress("download");
    let app_result = install_desktop_app(&CLAUDE_DESKTOP, &layout, &mut |current, total| {
        progress.set(current, total);
    });
    match app_result {
        Ok(outcome) => {
            if outcome.status == StepStatus::Installed {
                progress.finish_success();
            } else {
                progress.finish_abandon();
            }
            driver.record(outcome);
        }
        Err(err) => {
            progress.finish_abandon();
            driver.record(StepOutcome::failed(CLAUDE_DESKTOP.name, format!("{err:#}")));
        }
    }

    driver.section("Credentials");
    let mut resolver = ensure_secrets_resolver(&mut driver, &brew, &config.vault);

    let enabled: Vec<&IntegrationManifest> = catalog()
        .iter()
        .filter(|entry| !config.is_disabled(entry.name))
        .collect();

    let all_requests: Vec<_> = enabled
        .iter()
        .flat_map(|entry| entry.credentials.iter().copied())
        .collect();
    let credentials = Credentials::resolve(&mut resolver, &all_requests);
    driver.warn_all(&resolver.take_warnings());

    for entry in &enabled {
        if entry.credentials.is_empty() {
            continue;
        }
        if credentials.service_complete(entry.credentials) {
            driver.ok(&format!("{} credentials complete", entry.display_name));
        } else {
            driver.warn(&format!(
                "{} credentials incomplete; missing fields are blank in the emitted configuration",
                entry.display_name
            ));
        }
    }

    driver.section("Integrations");
    let mut staged: BTreeMap<String, (IntegrationManifest, ServerEntry)> = BTreeMap::new();

    for entry in catalog() {
        if config.is_disabled(entry.name) {
            driver.record(StepOutcome::new(
                entry.display_name,
                StepStatus::Skipped,
                "disabled in config",
            ));
            continue;
        }

        let outcome = match entry.method {
            InstallMethod::NpmPackage { package } => {
                install_packaged_integration(PackageRuntime::Npm, package, entry.display_name)
            }
            InstallMethod::UvTool { package } => {
                install_packaged_integration(PackageRuntime::UvTool, package, entry.display_name)
            }
            InstallMethod::GitClone { repo_url, build } => {
                install_repo_entry(entry, repo_url, build, &servers_root, &credentials)
            }
        };

        if !outcome.status.is_failure() {
            let server_entry =
                build_server_entry(entry, layout.home(), &servers_root, &credentials);
            staged.insert(entry.name.to_string(), (*entry, server_entry));
        }
        driver.record(outcome);
    }

    // The sqlite server expects its database directory to exist.
    if staged.contains_key("sqlite") {
        let _ = fs::create_dir_all(layout.home().join("mcp-servers").join("data"));
    }

    driver.section("Configuration");
    let mut written_documents: Vec<PathBuf> = Vec::new();

    let claude_config = build_app_config(ConsumerApp::ClaudeDesktop, &staged);
    let claude_path = layout.claude_config_path();
    match write_config_document(&claude_path, &claude_config) {
        Ok(()) => {
            written_documents.push(claude_path.clone());
            driver.record(StepOutcome::new(
                "claude config",
                StepStatus::Configured,
                format!(
                    "{} ({} servers)",
                    claude_path.display(),
                    claude_config.mcp_servers.len()
                ),
            ));
        }
        Err(err) => driver.record(StepOutcome::failed("claude config", format!("{err:#}"))),
    }

    if layout.cursor_dir().is_dir() {
        let cursor_config = build_app_config(ConsumerApp::Cursor, &staged);
        let cursor_path = layout.cursor_config_path();
        match write_config_document(&cursor_path, &cursor_config) {
            Ok(()) => {
                written_documents.push(cursor_path.clone());
                driver.record(StepOutcome::new(
                    "cursor config",
                    StepStatus::Configured,
                    format!(
                        "{} ({} servers)",
                        cursor_path.display(),
                        cursor_config.mcp_servers.len()
                    ),
                ));
            }
            Err(err) => driver.record(StepOutcome::failed("cursor config", format!("{err:#}"))),
        }
    } else {
        driver.record(StepOutcome::new(
            "cursor config",
            StepStatus::Skipped,
            "~/.cursor not present",
        ));
    }

    driver.section("Summary");
    let summary = format_summary_lines(&driver.report);
    driver.renderer.print_lines(&summary);
    for line in &summary {
        driver.log.line("INFO", line);
    }
    for document in &written_documents {
        driver.info(&format!("wrote {}", document.display()));
    }
    let log_path = driver.log.path().to_path_buf();
    driver.info(&format!("full log at {}", log_path.display()));
    driver.log.line("INFO", "provisioning run finished");

    // Degraded steps are summary-visible only; the exit code stays zero.
    Ok(())
}

fn ensure_homebrew(driver: &mut Driver) -> Result<Brew> {
    if let Some(brew) = Brew::locate() {
        let version = brew
            .version()
            .map(|version| version.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        driver.record(StepOutcome::new(
            "homebrew",
            StepStatus::AlreadyPresent,
            version,
        ));
        return Ok(brew);
    }

    driver.info("homebrew missing; running the official installer");
    Brew::install().context("homebrew install failed")?;
    let brew = Brew::locate()
        .ok_or_else(|| anyhow::anyhow!("brew is not runnable after installation"))?;
    let version = brew
        .version()
        .map(|version| version.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    driver.record(StepOutcome::new("homebrew", StepStatus::Installed, version));
    Ok(brew)
}

fn ensure_secrets_resolver(driver: &mut Driver, brew: &Brew, vault: &str) -> SecretsResolver {
    let cli = match OpCli::locate() {
        Some(cli) => {
            let version = cli.version().unwrap_or_else(|_| "unknown".to_string());
            driver.record(StepOutcome::new(
                "secrets cli",
                StepStatus::AlreadyPresent,
                version,
            ));
            Some(cli)
        }
        None => match brew.install_cask(OpCli::brew_cask()) {
            Ok(()) => match OpCli::locate() {
                Some(cli) => {
                    let version = cli.version().unwrap_or_else(|_| "unknown".to_string());
                    driver.record(StepOutcome::new(
                        "secrets cli",
                        StepStatus::Installed,
                        version,
                    ));
                    Some(cli)
                }
                None => {
                    driver.record(StepOutcome::failed(
                        "secrets cli",
                        "not runnable after install",
                    ));
                    None
                }
            },
            Err(err) => {
                driver.record(StepOutcome::failed("secrets cli", format!("{err:#}")));
                None
            }
        },
    };

    let mut resolver = SecretsResolver::preflight(cli, vault);
    driver.warn_all(&resolver.take_warnings());
    if resolver.is_enabled() {
        driver.ok(&format!("vault '{vault}' is reachable"));
    }
    resolver
}

fn install_repo_entry(
    entry: &IntegrationManifest,
    repo_url: &str,
    build: macforge_core::RepoBuild,
    servers_root: &std::path::Path,
    credentials: &Credentials,
) -> StepOutcome {
    let install_dir = servers_root.join(entry.name);

    let env_content = match entry.secrets_file {
        Some(SecretsFile::DotEnv { .. }) => {
            Some(render_env_file(&credentials.env_for(entry.credentials)))
        }
        Some(SecretsFile::OauthClientJson { .. }) => {
            let client_id = credential_by_field(entry, credentials, "client_id");
            let client_secret = credential_by_field(entry, credentials, "client_secret");
            match render_oauth_client_json(&client_id, &client_secret) {
                Ok(content) => Some(content),
                Err(err) => {
                    return StepOutcome::failed(entry.display_name, format!("{err:#}"));
                }
            }
        }
        None => None,
    };

    let request = RepoInstallRequest {
        repo_url,
        install_dir: &install_dir,
        name: entry.name,
        env_file: entry.secrets_file.map(|file| file.file_name()),
        env_content: env_content.as_deref(),
        build,
    };

    match install_repo_integration(&request) {
        Ok((status, revision)) => StepOutcome::new(
            entry.display_name,
            status,
            format!("{} @ {revision}", install_dir.display()),
        ),
        Err(err) => StepOutcome::failed(entry.display_name, format!("{err:#}")),
    }
}

fn credential_by_field(
    entry: &IntegrationManifest,
    credentials: &Credentials,
    field: &str,
) -> String {
    entry
        .credentials
        .iter()
        .find(|request| request.field == field)
        .map(|request| credentials.value(request.item, request.field).to_string())
        .unwrap_or_default()
}

/// Read-only report of what a provisioning run would find.
pub fn run_doctor(style: OutputStyle) -> Result<()> {
    let renderer = TerminalRenderer::from_style(style);
    let layout = MachineLayout::from_env()?;
    let (config, _) = RunConfig::load(&layout.config_file_path());
    let servers_root = layout.servers_root(config.servers_root.as_deref());

    renderer.print_section("Doctor");
    renderer.print_status(
        "step",
        &format!(
            "architecture {} (package manager prefix {})",
            std::env::consts::ARCH,
            homebrew_prefix()
        ),
    );

    match Brew::locate() {
        Some(brew) => {
            let version = brew
                .version()
                .map(|version| version.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            renderer.print_status("ok", &format!("homebrew {version} at {}", brew.binary().display()));
        }
        None => renderer.print_status("warn", "homebrew not found"),
    }

    for (name, command, args) in [
        ("node", "node", &["--version"][..]),
        ("python", "python3", &["--version"][..]),
        ("uv", "uv", &["--version"][..]),
        ("git", "git", &["--version"][..]),
    ] {
        match probe_version(command, args) {
            Some(version) => renderer.print_status("ok", &format!("{name} {version}")),
            None => renderer.print_status("warn", &format!("{name} not found")),
        }
    }

    match OpCli::locate() {
        Some(cli) => {
            let version = cli.version().unwrap_or_else(|_| "unknown".to_string());
            let signed_in = if cli.account_ready() {
                "signed in"
            } else {
                "not signed in"
            };
            renderer.print_status("ok", &format!("secrets cli {version} ({signed_in})"));
        }
        None => renderer.print_status("warn", "secrets cli not found"),
    }

    renderer.print_status("step", &format!("vault: {}", config.vault));
    for (label, path) in [
        ("config file", layout.config_file_path()),
        ("claude config", layout.claude_config_path()),
        ("cursor config", layout.cursor_config_path()),
        ("servers root", servers_root),
        ("log file", layout.log_file_path()),
    ] {
        let state = if path.exists() { "present" } else { "absent" };
        renderer.print_status("step", &format!("{label}: {} ({state})", path.display()));
    }

    Ok(())
}
