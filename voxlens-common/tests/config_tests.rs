//! Integration tests for config path resolution, loading and atomic write-back
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate VOXLENS_TEST_CONFIG are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::Path;
use tempfile::TempDir;
use voxlens_common::config::{
    env_override, load_toml_config, resolve_config_path, write_toml_config, LoggingConfig,
};
use voxlens_common::Error;

const TEST_ENV_VAR: &str = "VOXLENS_TEST_CONFIG";

#[test]
#[serial]
fn test_env_path_used_when_no_cli_arg() {
    env::set_var(TEST_ENV_VAR, "/tmp/from-env.toml");

    let path = resolve_config_path(None, TEST_ENV_VAR, "voxlens.toml");
    assert_eq!(path.as_deref(), Some(Path::new("/tmp/from-env.toml")));

    env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_overrides_env() {
    env::set_var(TEST_ENV_VAR, "/tmp/from-env.toml");

    let path = resolve_config_path(
        Some(Path::new("/tmp/from-cli.toml")),
        TEST_ENV_VAR,
        "voxlens.toml",
    );
    assert_eq!(path.as_deref(), Some(Path::new("/tmp/from-cli.toml")));

    env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    env::set_var(TEST_ENV_VAR, "   ");
    assert!(env_override(TEST_ENV_VAR).is_none());
    env::remove_var(TEST_ENV_VAR);
}

#[test]
fn test_missing_explicit_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let result: Result<LoggingConfig, _> = load_toml_config(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("broken.toml");
    std::fs::write(&target, "level = [unterminated").unwrap();

    let result: Result<LoggingConfig, _> = load_toml_config(Some(&target));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("logging.toml");
    std::fs::write(&target, "level = \"debug\"\n").unwrap();

    let logging: LoggingConfig = load_toml_config(Some(&target)).unwrap();
    assert_eq!(logging.level, "debug");
    assert!(!logging.with_target);
}

#[test]
fn test_atomic_write_round_trips_and_cleans_temp() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("nested").join("voxlens.toml");

    let logging = LoggingConfig {
        level: "warn".to_string(),
        with_target: true,
    };
    write_toml_config(&logging, &target).unwrap();

    assert!(target.exists());
    assert!(!target.with_extension("toml.tmp").exists());

    let loaded: LoggingConfig = load_toml_config(Some(&target)).unwrap();
    assert_eq!(loaded, logging);
}

#[cfg(unix)]
#[test]
fn test_atomic_write_sets_owner_only_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("voxlens.toml");
    write_toml_config(&LoggingConfig::default(), &target).unwrap();

    let mode = std::fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
