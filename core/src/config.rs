//! Configuration management (config.toml)
//!
//! Handles loading, saving, and providing defaults for bridge settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gl::{ContextAttributes, GlConfig};
use crate::input::KeyMap;
use crate::runtime::RuntimeConfig;
use crate::wasm::{DEFAULT_RAM_LIMIT, ExportNames};

/// File name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Bridge configuration.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Cap on guest linear memory in bytes (default: 64 MiB)
    #[serde(default = "default_ram_limit")]
    pub ram_limit: usize,
    /// Frame scheduling
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Graphics forwarding and error policy
    #[serde(default)]
    pub gl: GlConfig,
    /// Drawing buffer attributes
    #[serde(default)]
    pub context: ContextAttributes,
    /// Guest export names
    #[serde(default)]
    pub exports: ExportNames,
    /// Key mapping and event delivery
    #[serde(default)]
    pub input: InputConfig,
}

/// Input configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Physical key code to the name the guest sees
    #[serde(default)]
    pub keymap: KeyMap,
    /// Events `fetch_event` hands out per tick, 0 for no limit (default: 1)
    #[serde(default = "default_max_events_per_tick")]
    pub max_events_per_tick: u32,
}

fn default_ram_limit() -> usize {
    DEFAULT_RAM_LIMIT
}
fn default_max_events_per_tick() -> u32 {
    1
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ram_limit: default_ram_limit(),
            runtime: RuntimeConfig::default(),
            gl: GlConfig::default(),
            context: ContextAttributes::default(),
            exports: ExportNames::default(),
            input: InputConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keymap: KeyMap::default(),
            max_events_per_tick: default_max_events_per_tick(),
        }
    }
}

/// Errors reading or writing a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory on this platform")]
    NoConfigDir,
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\glbridge\config`
/// On macOS: `~/Library/Application Support/io.glbridge.glbridge`
/// On Linux: `~/.config/glbridge`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.glbridge", "", "glbridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path of the default config file, if there is a config directory
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> BridgeConfig {
    let Some(path) = config_path() else {
        return BridgeConfig::default();
    };
    if !path.exists() {
        return BridgeConfig::default();
    }
    match load_from(&path) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(%error, "Using default config");
            BridgeConfig::default()
        }
    }
}

/// Loads the configuration from an explicit file, reporting any problem.
pub fn load_from(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves the configuration to the platform config directory.
///
/// Creates the directory if it doesn't exist.
pub fn save(config: &BridgeConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Saves the configuration to an explicit file.
pub fn save_to(config: &BridgeConfig, path: &Path) -> Result<(), ConfigError> {
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).map_err(write_error)?;
    }
    let content = to_toml(config)?;
    std::fs::write(path, content).map_err(write_error)
}

/// Render a config as pretty TOML
pub fn to_toml(config: &BridgeConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Check for settings that load but cannot work as intended.
///
/// Returns a list of warning messages; an empty list means the config is sane.
pub fn validate(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.runtime.tick_rate == 0 {
        warnings.push("runtime.tick_rate is 0; treating it as 1 Hz".to_string());
    }
    if config.runtime.refresh_hz == 0 {
        warnings.push("runtime.refresh_hz is 0; treating it as 1 Hz".to_string());
    }
    if config.gl.string_scan_limit == 0 {
        warnings.push("gl.string_scan_limit is 0; every guest string will be rejected".to_string());
    }
    if config.context.width == 0 || config.context.height == 0 {
        warnings.push(format!(
            "context size {}x{} is empty",
            config.context.width, config.context.height
        ));
    }
    if config.ram_limit < crate::wasm::WASM_PAGE_SIZE {
        warnings.push(format!(
            "ram_limit {} is below one WASM page; no guest with memory can load",
            config.ram_limit
        ));
    }
    for (code, name) in config.input.keymap.iter() {
        if name.is_empty() {
            warnings.push(format!("input.keymap.{} maps to an empty name", code));
        }
    }

    let exports = &config.exports;
    let hooks = [
        (&exports.init, "exports.init"),
        (&exports.destroy, "exports.destroy"),
        (&exports.apply_events, "exports.apply_events"),
        (&exports.tick, "exports.tick"),
        (&exports.draw, "exports.draw"),
    ];
    let mut seen = hashbrown::HashSet::new();
    for (export, field) in hooks {
        if export.is_empty() {
            warnings.push(format!("{} is empty", field));
        } else if !seen.insert(export.as_str()) {
            warnings.push(format!("{} '{}' is used by another hook", field, export));
        }
    }

    warnings
}
