//! Config defaults, loading, and validation tests for callgate-config.
// crates/callgate-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate defaults, file loading, and fail-closed rules.
// Purpose: Ensure a minimal config runs and invalid values are rejected.
// =============================================================================

use callgate_config::AccessConfig;
use callgate_config::ConfigError;
use callgate_config::GatewayConfig;
use callgate_core::CallTarget;

mod common;

type TestResult = Result<(), String>;

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn default_config_validates() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.server.route_prefix != "jbind:" {
        return Err(format!("unexpected route prefix {}", config.server.route_prefix));
    }
    if config.security.csrf_cookie_name != "CSRF-TOKEN" {
        return Err("csrf cookie name should default to CSRF-TOKEN".to_string());
    }
    if !config.audit.enabled {
        return Err("audit should default to enabled".to_string());
    }
    if !config.access.allow.is_empty() {
        return Err("access allowlist should default to empty".to_string());
    }
    Ok(())
}

#[test]
fn explicit_sections_override_defaults() -> TestResult {
    let config = GatewayConfig::from_toml_str(
        r#"
[server]
bind = "0.0.0.0:9000"
route_prefix = "rpc:"
max_body_bytes = 2048

[security]
origin = "https://app.example.com"
grace_ttl_secs = 120

[access]
allow = ["Greeter.greet", "Files.list"]
"#,
    )
    .map_err(|err| err.to_string())?;
    let addr = config.server.bind_addr().map_err(|err| err.to_string())?;
    if addr.port() != 9000 {
        return Err(format!("unexpected port {}", addr.port()));
    }
    let targets = config.access.targets().map_err(|err| err.to_string())?;
    if targets != vec![CallTarget::new("Greeter", "greet"), CallTarget::new("Files", "list")] {
        return Err("allowlist did not parse into targets".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn load_reads_explicit_path() -> TestResult {
    let file = common::write_config(b"[security]\norigin = \"https://rpc.example.org\"\n")?;
    let config = GatewayConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.security.origin != "https://rpc.example.org" {
        return Err("origin not loaded from file".to_string());
    }
    Ok(())
}

#[test]
fn load_rejects_non_utf8_files() -> TestResult {
    let file = common::write_config(&[0xff, 0xfe, 0x00])?;
    common::assert_invalid(GatewayConfig::load(Some(file.path())), "utf-8")
}

#[test]
fn load_rejects_oversized_files() -> TestResult {
    let mut contents = b"# padding\n".to_vec();
    contents.resize(1024 * 1024 + 1, b' ');
    let file = common::write_config(&contents)?;
    common::assert_invalid(GatewayConfig::load(Some(file.path())), "size limit")
}

#[test]
fn load_reports_missing_files_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    match GatewayConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {}", describe(&other))),
    }
}

#[test]
fn load_reports_parse_errors() -> TestResult {
    let file = common::write_config(b"[server\nbind = 1")?;
    common::assert_invalid(GatewayConfig::load(Some(file.path())), "parse error")
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "not-an-address".to_string();
    common::assert_invalid(config.validate(), "server.bind")
}

#[test]
fn route_prefix_must_not_contain_separator() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.route_prefix = "rpc/".to_string();
    common::assert_invalid(config.validate(), "route_prefix")?;
    config.server.route_prefix = String::new();
    common::assert_invalid(config.validate(), "route_prefix")
}

#[test]
fn max_body_bytes_must_be_positive() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    common::assert_invalid(config.validate(), "max_body_bytes")
}

#[test]
fn origin_must_be_http_without_trailing_slash() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.security.origin = "ftp://example.com".to_string();
    common::assert_invalid(config.validate(), "security.origin")?;
    config.security.origin = "https://example.com/".to_string();
    common::assert_invalid(config.validate(), "trailing slash")
}

#[test]
fn cookie_names_must_differ() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.security.session_cookie_name = config.security.csrf_cookie_name.clone();
    common::assert_invalid(config.validate(), "must differ")
}

#[test]
fn grace_ttl_is_bounded() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.security.grace_ttl_secs = 0;
    common::assert_invalid(config.validate(), "grace_ttl_secs")?;
    config.security.grace_ttl_secs = 30 * 24 * 60 * 60;
    common::assert_invalid(config.validate(), "grace_ttl_secs")
}

#[test]
fn signing_key_path_must_be_non_empty() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.security.signing_key_path = Some("  ".to_string());
    common::assert_invalid(config.validate(), "signing_key_path")
}

#[test]
fn malformed_access_entries_are_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.access = AccessConfig {
        allow: vec!["Greeter".to_string()],
    };
    common::assert_invalid(config.validate(), "Class.method")
}

#[test]
fn empty_audit_path_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.audit.path = Some(String::new());
    common::assert_invalid(config.validate(), "audit.path")
}

/// Renders a load result for failure messages.
fn describe(result: &Result<GatewayConfig, ConfigError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => err.to_string(),
    }
}
