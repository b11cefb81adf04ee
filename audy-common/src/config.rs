//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing or unreadable TOML file is never fatal: the server logs a
//! warning and starts with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "AUDY_ROOT_FOLDER";

/// Environment variable overriding the TOML config path
pub const CONFIG_PATH_ENV: &str = "AUDY_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding `storage.db`, `music/` and `upload/`
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub library: LibraryConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            bind: default_bind(),
            logging: LoggingConfig::default(),
            library: LibraryConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Tunables of the ingestion, streaming and live-update components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Maximum bytes served per range response
    pub chunk_size: u64,

    /// Outbound queue capacity of a live channel
    pub channel_capacity: usize,

    /// Outcome buffer of a user's import queue
    pub import_event_capacity: usize,

    /// Delay before each remote import job, milliseconds
    pub import_pacing_ms: u64,

    /// Largest stored artwork edge, pixels
    pub artwork_max_dimension: u32,

    /// Edge difference still treated as a square image, pixels
    pub artwork_square_tolerance: u32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 500,
            channel_capacity: 10,
            import_event_capacity: 100,
            import_pacing_ms: 1000,
            artwork_max_dimension: 350,
            artwork_square_tolerance: 2,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default TOML location: `$AUDY_CONFIG`, else `<config dir>/audy/audy.toml`
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("audy").join("audy.toml"))
}

/// Load TOML config, falling back to defaults when the file is absent
///
/// A file that exists but fails to parse is reported as `Error::Config`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves the root folder with CLI > ENV > TOML > default priority
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_value: toml.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("audy"))
        .unwrap_or_else(|| PathBuf::from("./audy_data"))
}
