use semver::Version;

use super::*;

#[test]
fn parse_node_style_version() {
    let version = parse_lenient_version("v22.1.0\n").expect("must parse");
    assert_eq!(version, Version::new(22, 1, 0));
}

#[test]
fn parse_banner_prefixed_version() {
    let version = parse_lenient_version("Python 3.12.4").expect("must parse");
    assert_eq!(version, Version::new(3, 12, 4));

    let version = parse_lenient_version("Homebrew 4.3.9").expect("must parse");
    assert_eq!(version, Version::new(4, 3, 9));
}

#[test]
fn parse_pads_missing_patch_field() {
    let version = parse_lenient_version("uv 0.5").expect("must parse");
    assert_eq!(version, Version::new(0, 5, 0));
}

#[test]
fn parse_takes_first_dotted_run_not_trailing_noise() {
    let version = parse_lenient_version("git version 2.39.2 (Apple Git-143)").expect("must parse");
    assert_eq!(version, Version::new(2, 39, 2));
}

#[test]
fn parse_skips_noise_lines_before_version() {
    let version =
        parse_lenient_version("Now using node v22.11.0 (npm v10.9.0)").expect("must parse");
    assert_eq!(version, Version::new(22, 11, 0));
}

#[test]
fn parse_rejects_versionless_output() {
    assert!(parse_lenient_version("command not found").is_err());
    assert!(parse_lenient_version("").is_err());
}

#[test]
fn parse_rejects_non_numeric_patch_token() {
    // "1.2.x" must not half-parse; the next token provides the real version.
    let version = parse_lenient_version("api 1.2.x core 3.4.5").expect("must parse");
    assert_eq!(version, Version::new(3, 4, 5));
}

#[test]
fn minimum_comparison_is_inclusive() {
    let minimum = Version::new(20, 0, 0);
    assert!(meets_minimum(&Version::new(20, 0, 0), &minimum));
    assert!(meets_minimum(&Version::new(22, 1, 0), &minimum));
    assert!(!meets_minimum(&Version::new(18, 20, 4), &minimum));
}

#[test]
fn catalog_passes_its_own_invariants() {
    validate_catalog(catalog()).expect("catalog must be internally consistent");
}

#[test]
fn catalog_has_expected_shape() {
    let entries = catalog();
    assert_eq!(entries.len(), 12);

    let repo_based = entries
        .iter()
        .filter(|entry| entry.method.is_repo_based())
        .count();
    assert_eq!(repo_based, 3);

    // Every repo-based integration launches out of its clone directory.
    for entry in entries {
        if entry.method.is_repo_based() {
            assert!(
                matches!(entry.launch, Launch::NodeDist { .. }),
                "{} should launch from its clone",
                entry.name
            );
        }
    }
}

#[test]
fn catalog_claude_superset_of_cursor() {
    for entry in catalog() {
        if entry.eligible_for(ConsumerApp::Cursor) {
            assert!(
                entry.eligible_for(ConsumerApp::ClaudeDesktop),
                "{} is cursor-only, which the emitter does not expect",
                entry.name
            );
        }
    }
}

#[test]
fn validate_rejects_duplicate_names() {
    let mut entries = catalog().to_vec();
    entries.push(entries[0]);
    let err = validate_catalog(&entries).unwrap_err();
    assert!(err.to_string().contains("duplicate integration name"));
}

#[test]
fn validate_rejects_secrets_file_without_clone() {
    let entries = vec![IntegrationManifest {
        name: "bogus",
        display_name: "Bogus",
        method: InstallMethod::NpmPackage { package: "bogus" },
        launch: Launch::Npx { extra_args: &[] },
        consumers: &[ConsumerApp::ClaudeDesktop],
        credentials: &[CredentialRequest {
            item: "Bogus",
            field: "token",
            env_key: "BOGUS_TOKEN",
        }],
        secrets_file: Some(SecretsFile::DotEnv { file_name: ".env" }),
    }];
    let err = validate_catalog(&entries).unwrap_err();
    assert!(err.to_string().contains("without a clone directory"));
}

#[test]
fn run_config_defaults() {
    let config = RunConfig::default();
    assert_eq!(config.vault, "Provisioning");
    assert_eq!(config.node_major, 22);
    assert_eq!(config.node_minimum, Version::new(20, 0, 0));
    assert!(config.servers_root.is_none());
    assert!(config.disabled.is_empty());
}

#[test]
fn run_config_overlay_keeps_unset_defaults() {
    let config = RunConfig::from_toml_str("vault = \"Personal\"\n").expect("must parse");
    assert_eq!(config.vault, "Personal");
    assert_eq!(config.node_major, 22);
}

#[test]
fn run_config_full_overlay() {
    let config = RunConfig::from_toml_str(
        "vault = \"Team\"\nnode_major = 24\nservers_root = \"~/integrations\"\ndisabled = [\"puppeteer\", \"sqlite\"]\n",
    )
    .expect("must parse");
    assert_eq!(config.vault, "Team");
    assert_eq!(config.node_major, 24);
    assert_eq!(config.servers_root.as_deref(), Some("~/integrations"));
    assert!(config.is_disabled("puppeteer"));
    assert!(config.is_disabled("sqlite"));
    assert!(!config.is_disabled("slack"));
}

#[test]
fn run_config_rejects_unknown_keys() {
    assert!(RunConfig::from_toml_str("vaultt = \"oops\"\n").is_err());
}

#[test]
fn run_config_load_missing_file_is_silent_defaults() {
    let path = std::env::temp_dir().join("macforge-core-test-no-such-config.toml");
    let _ = std::fs::remove_file(&path);
    let (config, warning) = RunConfig::load(&path);
    assert_eq!(config, RunConfig::default());
    assert!(warning.is_none());
}

#[test]
fn run_config_load_malformed_file_warns_and_defaults() {
    let path = std::env::temp_dir().join("macforge-core-test-bad-config.toml");
    std::fs::write(&path, "vault = [not toml").expect("must write fixture");
    let (config, warning) = RunConfig::load(&path);
    assert_eq!(config, RunConfig::default());
    assert!(warning.expect("must warn").contains("using defaults"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unknown_disabled_names_are_reported() {
    let config = RunConfig::from_toml_str("disabled = [\"puppeteer\", \"telegram\"]\n")
        .expect("must parse");
    let known: Vec<&str> = catalog().iter().map(|entry| entry.name).collect();
    assert_eq!(config.unknown_disabled(&known), vec!["telegram"]);
}

#[test]
fn step_status_tokens_round_trip() {
    for status in [
        StepStatus::Installed,
        StepStatus::AlreadyPresent,
        StepStatus::Upgraded,
        StepStatus::Configured,
        StepStatus::Skipped,
        StepStatus::Failed,
    ] {
        assert_eq!(StepStatus::parse(status.as_str()).expect("must parse"), status);
    }
    assert!(StepStatus::parse("exploded").is_err());
}

#[test]
fn report_counts_failures_only() {
    let mut report = StepReport::new();
    report.record(StepOutcome::new("brew", StepStatus::AlreadyPresent, "4.3.9"));
    report.record(StepOutcome::failed("gmail", "clone failed"));
    report.record(StepOutcome::new("node", StepStatus::Installed, "22.11.0"));
    assert_eq!(report.failed_count(), 1);
    assert!(report.is_degraded());
    assert_eq!(report.outcomes().len(), 3);
}
