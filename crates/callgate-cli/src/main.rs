// crates/callgate-cli/src/main.rs
// ============================================================================
// Module: Callgate CLI Entry Point
// Description: Operator commands for routes, CSRF token keys, and config.
// Purpose: Inspect gateway routes and key material without a running server.
// Dependencies: clap, callgate-core, callgate-config, callgate-http, thiserror.
// ============================================================================

//! ## Overview
//! The `callgate` binary encodes and decodes dispatch routes, manages the
//! ed25519 key that signs fallback CSRF tokens, and validates configuration
//! files. Security posture: key files and tokens are untrusted input and are
//! bounded by the loaders in `callgate-http`.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use callgate_config::GatewayConfig;
use callgate_core::CallTarget;
use callgate_core::DEFAULT_ROUTE_PREFIX;
use callgate_core::ROUTE_SEPARATOR;
use callgate_core::RouteDecoder;
use callgate_http::CsrfTokenIssuer;
use callgate_http::CsrfTokenVerifier;
use callgate_http::token::encode_signing_key;
use callgate_http::token::generate_signing_key;
use callgate_http::token::load_signing_key;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use ed25519_dalek::SigningKey;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default lifetime for tokens issued from the command line.
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command-line interface for Callgate.
#[derive(Parser, Debug)]
#[command(name = "callgate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print the CLI version and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected command.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode or decode dispatch routes.
    Route {
        /// Selected route subcommand.
        #[command(subcommand)]
        command: RouteCommand,
    },
    /// Manage CSRF token signing keys and tokens.
    Token {
        /// Selected token subcommand.
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Route subcommands.
#[derive(Subcommand, Debug)]
enum RouteCommand {
    /// Print the route that dispatches to `Class.method`.
    Encode(RouteEncodeCommand),
    /// Print the target a route dispatches to.
    Decode(RouteDecodeCommand),
}

/// Arguments for `route encode`.
#[derive(Args, Debug)]
struct RouteEncodeCommand {
    /// Registered class name.
    #[arg(value_name = "CLASS")]
    class: String,
    /// Method name on the class.
    #[arg(value_name = "METHOD")]
    method: String,
    /// Route prefix the gateway is configured with.
    #[arg(long, default_value = DEFAULT_ROUTE_PREFIX)]
    prefix: String,
}

/// Arguments for `route decode`.
#[derive(Args, Debug)]
struct RouteDecodeCommand {
    /// Route (request path) to decode.
    #[arg(value_name = "ROUTE")]
    route: String,
    /// Route prefix the gateway is configured with.
    #[arg(long, default_value = DEFAULT_ROUTE_PREFIX)]
    prefix: String,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Generate a new ed25519 signing key (base64 seed).
    Keygen(TokenKeygenCommand),
    /// Issue a signed CSRF token for a session id.
    Issue(TokenIssueCommand),
    /// Verify a signed CSRF token and print its claims.
    Verify(TokenVerifyCommand),
}

/// Arguments for `token keygen`.
#[derive(Args, Debug)]
struct TokenKeygenCommand {
    /// Write the key to this path instead of stdout (must not exist).
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

/// Arguments for `token issue`.
#[derive(Args, Debug)]
struct TokenIssueCommand {
    /// Signing key file.
    #[arg(long, value_name = "PATH")]
    key: PathBuf,
    /// Session id the token is bound to.
    #[arg(long)]
    subject: String,
    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    ttl_secs: u64,
}

/// Arguments for `token verify`.
#[derive(Args, Debug)]
struct TokenVerifyCommand {
    /// Signing key file whose public half checks the token.
    #[arg(long, value_name = "PATH")]
    key: PathBuf,
    /// Token to verify.
    #[arg(value_name = "TOKEN")]
    token: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to callgate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable message.
    message: String,
}

impl CliError {
    /// Creates a new CLI error.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// Result alias for CLI operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments and dispatches the selected command.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("callgate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Route {
            command,
        } => command_route(command),
        Commands::Token {
            command,
        } => command_token(command),
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Route Commands
// ============================================================================

/// Dispatches route subcommands.
fn command_route(command: RouteCommand) -> CliResult<ExitCode> {
    let line = match command {
        RouteCommand::Encode(command) => {
            encode_route(&command.class, &command.method, &command.prefix)?
        }
        RouteCommand::Decode(command) => {
            decode_route(&command.route, &command.prefix)?.to_string()
        }
    };
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Encodes `class.method` into a route under `prefix`.
fn encode_route(class: &str, method: &str, prefix: &str) -> CliResult<String> {
    if class.is_empty() || method.is_empty() {
        return Err(CliError::new("class and method must be non-empty".to_string()));
    }
    if class.contains(ROUTE_SEPARATOR) {
        return Err(CliError::new(format!(
            "class name must not contain '{ROUTE_SEPARATOR}': {class}"
        )));
    }
    Ok(RouteDecoder::new(prefix).encode(&CallTarget::new(class, method)))
}

/// Decodes a route into a `{class, method}` JSON object.
fn decode_route(route: &str, prefix: &str) -> CliResult<Value> {
    let target = RouteDecoder::new(prefix)
        .decode(route)
        .map_err(|err| CliError::new(format!("route decode failed: {err}")))?;
    Ok(json!({
        "class": target.class.as_str(),
        "method": target.method.as_str(),
    }))
}

// ============================================================================
// SECTION: Token Commands
// ============================================================================

/// Dispatches token subcommands.
fn command_token(command: TokenCommand) -> CliResult<ExitCode> {
    match command {
        TokenCommand::Keygen(command) => command_token_keygen(&command),
        TokenCommand::Issue(command) => command_token_issue(&command),
        TokenCommand::Verify(command) => command_token_verify(&command),
    }
}

/// Executes `token keygen`.
fn command_token_keygen(command: &TokenKeygenCommand) -> CliResult<ExitCode> {
    let key = generate_signing_key();
    match &command.out {
        Some(path) => {
            write_new_key(path, &key)?;
            write_stdout_line(&format!("signing key written to {}", path.display()))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        None => {
            write_stdout_line(&encode_signing_key(&key))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes a base64 key seed to a path that must not already exist.
fn write_new_key(path: &Path, key: &SigningKey) -> CliResult<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path).map_err(|err| {
        CliError::new(format!("unable to create key file {}: {err}", path.display()))
    })?;
    writeln!(file, "{}", encode_signing_key(key)).map_err(|err| {
        CliError::new(format!("unable to write key file {}: {err}", path.display()))
    })?;
    Ok(())
}

/// Executes `token issue`.
fn command_token_issue(command: &TokenIssueCommand) -> CliResult<ExitCode> {
    let token = issue_token(&command.key, &command.subject, command.ttl_secs)?;
    write_stdout_line(&token).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Issues a token for `subject` signed by the key at `key_path`.
fn issue_token(key_path: &Path, subject: &str, ttl_secs: u64) -> CliResult<String> {
    if subject.is_empty() {
        return Err(CliError::new("subject must be non-empty".to_string()));
    }
    let key = load_signing_key(key_path).map_err(|err| CliError::new(err.to_string()))?;
    CsrfTokenIssuer::new(key, Duration::from_secs(ttl_secs))
        .issue(subject)
        .map_err(|err| CliError::new(err.to_string()))
}

/// Executes `token verify`.
fn command_token_verify(command: &TokenVerifyCommand) -> CliResult<ExitCode> {
    let claims = verify_token(&command.key, &command.token)?;
    write_stdout_line(&claims.to_string())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Verifies `token` against the key at `key_path`, returning its claims.
fn verify_token(key_path: &Path, token: &str) -> CliResult<Value> {
    let key = load_signing_key(key_path).map_err(|err| CliError::new(err.to_string()))?;
    let claims = CsrfTokenVerifier::new(key.verifying_key())
        .verify(token)
        .map_err(|err| CliError::new(format!("token rejected: {err}")))?;
    serde_json::to_value(&claims).map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = GatewayConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

/// Formats a stream write failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}
