//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `ppm.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: where the http server listens.
//!     - StorageConfig: where segment files live, how they are named, when they rotate.
//!     - LoggingConfig: default log level and per-reading verbosity.
//!
//! every section (and every field) is optional in the file; anything left out
//! takes the value from `Default`.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// directory holding the segment files
    pub data_dir: PathBuf,
    /// segment files are named `<file_prefix>_<index>.<file_extension>`
    pub file_prefix: String,
    pub file_extension: String,
    /// records per segment before rotating to the next one
    pub lines_per_file: u64,
    /// pick up the last segment and its line count at startup (off: start at
    /// segment 0, line 0 like a fresh process)
    pub resume_on_start: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_readings: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            file_prefix: "measurements".to_string(),
            file_extension: "txt".to_string(),
            lines_per_file: 10_000,
            resume_on_start: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: true }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config = Self::parse(&content)?;
        Ok(config)
    }

    /// Parse and validate a toml document
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        if config.storage.lines_per_file == 0 {
            anyhow::bail!("storage.lines_per_file must be at least 1");
        }
        if config.storage.file_prefix.is_empty() {
            anyhow::bail!("storage.file_prefix must not be empty");
        }

        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("ppm.toml"),
            PathBuf::from("..").join("config").join("ppm.toml"),
        ];

        let mut config = None;
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(c) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        config = Some(c);
                        break;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            println!("[CONFIG] Warning: No config file found - using defaults");
            Self::default()
        });
        config.apply_env(std::env::var("PORT").ok().as_deref());
        config
    }

    /// `PORT` wins over the file when it is a valid port number
    fn apply_env(&mut self, port: Option<&str>) {
        if let Some(raw) = port {
            match raw.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => println!("[CONFIG] Warning: ignoring invalid PORT={:?}", raw),
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│           SERVER CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Listen: {}", self.bind_address());
        println!("│ Data Dir: {}", self.storage.data_dir.display());
        println!("│ Segment: {}_N.{}", self.storage.file_prefix, self.storage.file_extension);
        println!("│ Lines/File: {}", self.storage.lines_per_file);
        println!("│ Resume: {}", self.storage.resume_on_start);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
