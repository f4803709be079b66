//! Configuration file support.
//!
//! Settings are stored as pretty-printed JSON. Every field has a default, so
//! partial files written by older versions still load.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_RGB_BANDS};

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get all log levels in order from least to most verbose.
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }

    /// Raise verbosity by `steps` levels, saturating at Trace.
    pub fn raised(self, steps: u8) -> LogLevel {
        let all = Self::all();
        let current = all.iter().position(|l| *l == self).unwrap_or(2);
        all[(current + steps as usize).min(all.len() - 1)]
    }
}

/// Encoding used for RGB previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    Png,
    #[default]
    Jpeg,
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// RGB preview settings
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Default analysis parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// RGB preview section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default)]
    pub format: PreviewFormat,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Band indices used when a preview request names none
    #[serde(default = "default_bands")]
    pub default_bands: [usize; 3],
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_bands() -> [usize; 3] {
    DEFAULT_RGB_BANDS
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            format: PreviewFormat::default(),
            jpeg_quality: default_jpeg_quality(),
            default_bands: default_bands(),
        }
    }
}

/// Analysis defaults section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_pca_components")]
    pub pca_components: usize,

    #[serde(default = "default_kmeans_clusters")]
    pub kmeans_clusters: usize,

    /// Report per-band standard deviation alongside mean spectra
    #[serde(default = "default_include_std")]
    pub include_std: bool,
}

fn default_pca_components() -> usize {
    3
}

fn default_kmeans_clusters() -> usize {
    5
}

fn default_include_std() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pca_components: default_pca_components(),
            kmeans_clusters: default_kmeans_clusters(),
            include_std: default_include_std(),
        }
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: LogLevel::default(),
            preview: PreviewConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "hsi-explorer-config.json"
    }

    /// Get the default config file path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("hsi-explorer").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("hsi-explorer")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from_path(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to an explicit file, creating parent directories.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version \
         {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
