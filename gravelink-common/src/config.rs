//! Configuration file loading
//!
//! Config file resolution follows this priority order:
//! 1. Explicit path from the caller (highest priority)
//! 2. `GRAVELINK_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/gravelink/gravelink.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "GRAVELINK_CONFIG";

const CONFIG_DIR_NAME: &str = "gravelink";
const CONFIG_FILE_NAME: &str = "gravelink.toml";

/// Logging section of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    /// Include the event target (module path) in log lines
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
        }
    }
}

/// Parsed config file
///
/// The `[resolver]` table is kept raw here; the resolver crate owns its schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub resolver: toml::Table,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a file that must exist
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Locate the config file to use, if any
///
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: caller-supplied path
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    default_config_path().filter(|path| path.exists())
}

/// `<config_dir>/gravelink/gravelink.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration with graceful degradation
///
/// A missing file yields defaults. A file that exists but fails to parse is
/// an error, since silently ignoring it would hide a misconfiguration.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(explicit) else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(TomlConfig::default());
    }

    let config = TomlConfig::from_file(&path)?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
