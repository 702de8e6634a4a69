//! Configuration file resolution, loading and write-back
//!
//! Config file location follows this priority order:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable
//! 3. Per-user config directory (`~/.config/voxlens/<file>` on Linux)
//!
//! A missing file is not an error: callers fall back to compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application directory name under the platform config dir
pub const APP_DIR: &str = "voxlens";

/// Logging section shared by every voxlens config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is not set
    pub level: String,
    /// Include module targets in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

/// Resolve the config file path without touching its contents
///
/// Returns `None` when no candidate exists; an explicit or environment path is
/// returned even if the file is absent so the caller can report it.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    user_config_path(file_name).filter(|path| path.exists())
}

/// Per-user config file location (`~/.config/voxlens/<file>` on Linux)
pub fn user_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(file_name))
}

/// Load a TOML config file, or defaults when `path` is `None`
///
/// # Errors
/// - `Error::Config` if an explicit path does not exist or fails to parse
/// - `Error::Io` if the file cannot be read
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a config value as TOML atomically (temp file + rename)
///
/// Parent directories are created if missing. On Unix the file is written
/// with 0600 permissions since it may carry service URLs and credentials.
pub fn write_toml_config<T: Serialize>(config: &T, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = target.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&temp_path, target)?;
    Ok(())
}

/// Read an environment override, ignoring empty values
pub fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
