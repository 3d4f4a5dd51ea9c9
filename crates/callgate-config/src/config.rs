// crates/callgate-config/src/config.rs
// ============================================================================
// Module: Callgate Configuration
// Description: Configuration loading and validation for the RPC gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: callgate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file yields a runnable local
//! gateway. Invalid values fail closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use callgate_core::CallTarget;
use callgate_core::DEFAULT_ROUTE_PREFIX;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "callgate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CALLGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `server.max_body_bytes`.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum route prefix length.
pub(crate) const MAX_ROUTE_PREFIX_LENGTH: usize = 64;
/// Maximum cookie name length.
pub(crate) const MAX_COOKIE_NAME_LENGTH: usize = 128;
/// Maximum grace token lifetime in seconds (seven days).
pub(crate) const MAX_GRACE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Maximum number of access allowlist entries.
pub(crate) const MAX_ACCESS_RULES: usize = 1024;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Gateway configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Origin and CSRF settings.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Static access allowlist.
    #[serde(default)]
    pub access: AccessConfig,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GatewayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.security.validate()?;
        self.access.validate()?;
        self.audit.validate()
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Route prefix preceding the encoded target.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            route_prefix: default_route_prefix(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is invalid: {}", self.bind)))
    }

    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        let prefix = self.route_prefix.as_str();
        if prefix.is_empty() || prefix.len() > MAX_ROUTE_PREFIX_LENGTH {
            return Err(ConfigError::Invalid("server.route_prefix length out of range".to_string()));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_graphic() && ch != '/') {
            return Err(ConfigError::Invalid(
                "server.route_prefix must be printable ascii without '/'".to_string(),
            ));
        }
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid("server.max_body_bytes out of range".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Security
// ============================================================================

/// Origin and CSRF configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Application origin compared against the `Origin` header.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Name of the CSRF cookie.
    #[serde(default = "default_csrf_cookie_name")]
    pub csrf_cookie_name: String,
    /// Name of the session cookie.
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    /// Optional ed25519 signing key (raw 32 bytes or base64 text).
    #[serde(default)]
    pub signing_key_path: Option<String>,
    /// Lifetime of issued fallback tokens in seconds.
    #[serde(default = "default_grace_ttl_secs")]
    pub grace_ttl_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            csrf_cookie_name: default_csrf_cookie_name(),
            session_cookie_name: default_session_cookie_name(),
            signing_key_path: None,
            grace_ttl_secs: default_grace_ttl_secs(),
        }
    }
}

impl SecurityConfig {
    /// Validates security settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin.trim();
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "security.origin must start with http:// or https://".to_string(),
            ));
        }
        if origin.ends_with('/') || origin != self.origin {
            return Err(ConfigError::Invalid(
                "security.origin must not carry a trailing slash or whitespace".to_string(),
            ));
        }
        validate_cookie_name("security.csrf_cookie_name", &self.csrf_cookie_name)?;
        validate_cookie_name("security.session_cookie_name", &self.session_cookie_name)?;
        if self.csrf_cookie_name == self.session_cookie_name {
            return Err(ConfigError::Invalid(
                "security.csrf_cookie_name must differ from session_cookie_name".to_string(),
            ));
        }
        if let Some(path) = &self.signing_key_path {
            validate_path_string("security.signing_key_path", path)?;
        }
        if self.grace_ttl_secs == 0 || self.grace_ttl_secs > MAX_GRACE_TTL_SECS {
            return Err(ConfigError::Invalid("security.grace_ttl_secs out of range".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Access
// ============================================================================

/// Static access allowlist. An empty list allows every registered method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Allowed `Class.method` entries.
    #[serde(default)]
    pub allow: Vec<String>,
}

impl AccessConfig {
    /// Parses the allowlist into call targets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an entry is not `Class.method`.
    pub fn targets(&self) -> Result<Vec<CallTarget>, ConfigError> {
        self.allow.iter().map(|entry| parse_access_entry(entry)).collect()
    }

    /// Validates the allowlist.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.allow.len() > MAX_ACCESS_RULES {
            return Err(ConfigError::Invalid("too many access.allow entries".to_string()));
        }
        self.targets().map(|_| ())
    }
}

/// Parses one `Class.method` allowlist entry.
fn parse_access_entry(entry: &str) -> Result<CallTarget, ConfigError> {
    let trimmed = entry.trim();
    match trimmed.split_once('.') {
        Some((class, method)) if !class.is_empty() && !method.is_empty() => {
            Ok(CallTarget::new(class, method))
        }
        _ => Err(ConfigError::Invalid(format!("access.allow entry must be Class.method: {entry}"))),
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a cookie name (RFC 6265 token subset).
fn validate_cookie_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.len() > MAX_COOKIE_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} length out of range")));
    }
    if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')) {
        return Err(ConfigError::Invalid(format!("{field} contains invalid characters")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default route prefix.
fn default_route_prefix() -> String {
    DEFAULT_ROUTE_PREFIX.to_string()
}

/// Default max body size (10 MiB).
pub(crate) const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default application origin.
fn default_origin() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Default CSRF cookie name.
fn default_csrf_cookie_name() -> String {
    "CSRF-TOKEN".to_string()
}

/// Default session cookie name.
fn default_session_cookie_name() -> String {
    "CALLGATE-SESSION".to_string()
}

/// Default grace token lifetime (one hour).
pub(crate) const fn default_grace_ttl_secs() -> u64 {
    60 * 60
}

/// Default audit logging enabled.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
