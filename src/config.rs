use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const APP_DIR_NAME: &str = "webspeed";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "history.db";

pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REMOTE_HOST: &str = "localhost";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Analyzer policy values. Every comparison against these is a strict `>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub ttfb_ms: f64,
    pub dom_load_ms: f64,
    pub full_load_ms: f64,
    pub lcp_ms: f64,
    pub cls: f64,
    pub fid_ms: f64,
    pub max_requests: usize,
    pub max_total_bytes: u64,
    pub large_image_bytes: u64,
    pub slow_script_ms: f64,
    pub render_blocking_ms: f64,
    pub slow_font_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ttfb_ms: 600.0,
            dom_load_ms: 2000.0,
            full_load_ms: 3000.0,
            lcp_ms: 2500.0,
            cls: 0.1,
            fid_ms: 100.0,
            max_requests: 120,
            max_total_bytes: 2 * 1024 * 1024,
            large_image_bytes: 250 * 1024,
            slow_script_ms: 300.0,
            render_blocking_ms: 200.0,
            slow_font_ms: 150.0,
        }
    }
}

/// How scans reach a browser and what they do with the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Bounds browser setup, navigation and in-page evaluation for one URL
    pub navigation_timeout_secs: u64,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// Attach to an already running browser instead of launching one
    pub remote_debugging_port: Option<u16>,
    pub remote_host: String,
    pub save_to_history: bool,
    /// When set, every scan writes a full-page screenshot here
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            headless: true,
            chrome_executable: None,
            remote_debugging_port: None,
            remote_host: DEFAULT_REMOTE_HOST.to_string(),
            save_to_history: true,
            screenshot_dir: None,
        }
    }
}

impl ScanSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub db_path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| data_dir().join(DB_FILE_NAME))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanSettings,
    pub storage: StorageSettings,
    pub thresholds: Thresholds,
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Per-user data directory, falling back to the working directory
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}
