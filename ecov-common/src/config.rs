//! Configuration loading and resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ECOV_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: it is logged and the
//! remaining tiers are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Application directory name under the platform config/data dirs
pub const APP_NAME: &str = "ecoverifier";
/// Local profile database file inside the root folder
pub const DATABASE_FILE: &str = "ecoverifier.db";
/// Audit/claim API used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "https://greenwash-api-production.up.railway.app";
/// Client-side timeout for audit generation
pub const DEFAULT_AUDIT_TIMEOUT_SECS: u64 = 90;
/// Longest accepted company name (characters, after trimming)
pub const DEFAULT_MAX_INPUT_CHARS: usize = 200;
/// Longest accepted claim text (characters, after trimming)
pub const DEFAULT_MAX_CLAIM_CHARS: usize = 2000;

pub const ENV_ROOT_FOLDER: &str = "ECOV_ROOT_FOLDER";
pub const ENV_API_URL: &str = "ECOV_API_URL";
pub const ENV_REMOTE_STORE_URL: &str = "ECOV_REMOTE_STORE_URL";
pub const ENV_AUDIT_TIMEOUT_SECS: &str = "ECOV_AUDIT_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "ECOV_LOG_LEVEL";

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// On-disk TOML configuration; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub api_base_url: Option<String>,
    /// Base URL of the authenticated document store
    pub remote_store_url: Option<String>,
    pub audit_timeout_secs: Option<u64>,
    pub max_input_chars: Option<usize>,
    pub max_claim_chars: Option<usize>,
    pub logging: LoggingConfig,
}

/// Compiled fallbacks for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub api_base_url: String,
    pub audit_timeout_secs: u64,
    pub max_input_chars: usize,
    pub max_claim_chars: usize,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            audit_timeout_secs: DEFAULT_AUDIT_TIMEOUT_SECS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_claim_chars: DEFAULT_MAX_CLAIM_CHARS,
            log_level: default_log_level(),
        }
    }
}

/// OS-dependent default profile folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\ecoverifier
        dirs::data_local_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ecoverifier"))
    } else {
        // ~/.local/share/ecoverifier, ~/Library/Application Support/ecoverifier
        dirs::data_local_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("./ecoverifier_data"))
    }
}

/// Default config file location (`~/.config/ecoverifier/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME).join("config.toml"))
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load a TOML config file, falling back to an empty config
///
/// `None` means "use the default location"; a missing default file is normal
/// and only logged at debug level.
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return TomlConfig::default(),
        },
    };

    if !path.exists() {
        if explicit {
            warn!("Config file {} not found, using defaults", path.display());
        } else {
            debug!("No config file at {}", path.display());
        }
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write a TOML config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Command-line overrides (tier 1)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub remote_store_url: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved client settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub root_folder: PathBuf,
    pub api_base_url: String,
    pub remote_store_url: Option<String>,
    pub audit_timeout: Duration,
    pub max_input_chars: usize,
    pub max_claim_chars: usize,
    pub log_level: String,
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

impl ClientSettings {
    /// Resolve every setting: CLI → ENV → TOML → compiled default
    pub fn resolve(overrides: &ConfigOverrides, toml: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = overrides
            .root_folder
            .clone()
            .or_else(|| env_string(ENV_ROOT_FOLDER).map(PathBuf::from))
            .or_else(|| toml.root_folder.clone())
            .unwrap_or(defaults.root_folder);

        let api_base_url = overrides
            .api_base_url
            .clone()
            .or_else(|| env_string(ENV_API_URL))
            .or_else(|| toml.api_base_url.clone())
            .unwrap_or(defaults.api_base_url);

        let remote_store_url = overrides
            .remote_store_url
            .clone()
            .or_else(|| env_string(ENV_REMOTE_STORE_URL))
            .or_else(|| toml.remote_store_url.clone());

        let audit_timeout_secs = env_parsed::<u64>(ENV_AUDIT_TIMEOUT_SECS)
            .or(toml.audit_timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.audit_timeout_secs);

        let log_level = overrides
            .log_level
            .clone()
            .or_else(|| env_string(ENV_LOG_LEVEL))
            .unwrap_or_else(|| toml.logging.level.clone());

        Self {
            root_folder,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            remote_store_url: remote_store_url.map(|u| u.trim_end_matches('/').to_string()),
            audit_timeout: Duration::from_secs(audit_timeout_secs),
            max_input_chars: toml.max_input_chars.unwrap_or(defaults.max_input_chars),
            max_claim_chars: toml.max_claim_chars.unwrap_or(defaults.max_claim_chars),
            log_level,
        }
    }

    /// Path of the local profile database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Create the root folder if it does not exist
    pub fn ensure_root_folder(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            tracing::info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }
}
