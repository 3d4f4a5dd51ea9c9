// crates/callgate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for route, token, and key-file helpers.
// Purpose: Ensure CLI helpers agree with the gateway and fail closed.
// Dependencies: callgate-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Exercises the pure helpers behind `route`, `token`, and `config` commands.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use callgate_core::CallTarget;
use callgate_core::RouteDecoder;
use callgate_http::token::generate_signing_key;
use clap::Parser;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ConfigValidateCommand;
use super::RouteCommand;
use super::command_config_validate;
use super::decode_route;
use super::encode_route;
use super::issue_token;
use super::verify_token;
use super::write_new_key;

// ============================================================================
// SECTION: Route Helpers
// ============================================================================

#[test]
fn encode_route_matches_gateway_decoder() {
    let route = encode_route("Greeter", "greet", "jbind:").unwrap();
    let target = RouteDecoder::default().decode(&route).unwrap();
    assert_eq!(target, CallTarget::new("Greeter", "greet"));
}

#[test]
fn encode_route_rejects_separator_in_class() {
    assert!(encode_route("a/b", "greet", "jbind:").is_err());
    assert!(encode_route("", "greet", "jbind:").is_err());
}

#[test]
fn decode_route_reports_class_and_method() {
    let route = RouteDecoder::new("rpc:").encode(&CallTarget::new("Orders", "list"));
    let decoded = decode_route(&format!("/{route}"), "rpc:").unwrap();
    assert_eq!(decoded["class"], "Orders");
    assert_eq!(decoded["method"], "list");
}

#[test]
fn decode_route_rejects_wrong_prefix() {
    let route = RouteDecoder::default().encode(&CallTarget::new("Orders", "list"));
    let err = decode_route(&route, "rpc:").unwrap_err();
    assert!(err.to_string().starts_with("route decode failed"));
}

// ============================================================================
// SECTION: Token Helpers
// ============================================================================

#[test]
fn issued_token_verifies_with_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("csrf.key");
    write_new_key(&key_path, &generate_signing_key()).unwrap();
    let token = issue_token(&key_path, "session-1", 60).unwrap();
    let claims = verify_token(&key_path, &token).unwrap();
    assert_eq!(claims["sub"], "session-1");
    assert_eq!(claims["exp"].as_u64().unwrap() - claims["iat"].as_u64().unwrap(), 60);
}

#[test]
fn token_from_other_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.key");
    let second = dir.path().join("second.key");
    write_new_key(&first, &generate_signing_key()).unwrap();
    write_new_key(&second, &generate_signing_key()).unwrap();
    let token = issue_token(&first, "session-1", 60).unwrap();
    let err = verify_token(&second, &token).unwrap_err();
    assert!(err.to_string().starts_with("token rejected"));
}

#[test]
fn issue_token_rejects_empty_subject() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("csrf.key");
    write_new_key(&key_path, &generate_signing_key()).unwrap();
    assert!(issue_token(&key_path, "", 60).is_err());
}

#[test]
fn write_new_key_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("csrf.key");
    fs::write(&key_path, "existing").unwrap();
    assert!(write_new_key(&key_path, &generate_signing_key()).is_err());
    assert_eq!(fs::read_to_string(&key_path).unwrap(), "existing");
}

// ============================================================================
// SECTION: Config and Parsing
// ============================================================================

#[test]
fn config_validate_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("callgate.toml");
    fs::write(&path, "[server]\nmax_body_bytes = 0\n").unwrap();
    let command = ConfigValidateCommand {
        config: Some(path),
    };
    let err = command_config_validate(&command).unwrap_err();
    assert!(err.to_string().starts_with("failed to load config"));
}

#[test]
fn cli_parses_nested_subcommands() {
    let cli = Cli::try_parse_from(["callgate", "route", "encode", "Greeter", "greet"]).unwrap();
    match cli.command {
        Some(Commands::Route {
            command: RouteCommand::Encode(command),
        }) => {
            assert_eq!(command.class, "Greeter");
            assert_eq!(command.prefix, "jbind:");
        }
        other => panic!("unexpected command: {other:?}"),
    }
    let cli = Cli::try_parse_from(["callgate", "config", "validate"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Config {
            command: ConfigCommand::Validate(_)
        })
    ));
}
