//! Service configuration
//!
//! All fields carry built-in defaults so the server runs without a config
//! file; a missing file is written out with the defaults rather than being
//! treated as fatal. For every limit a value of zero means
//! "unlimited/disabled", and an empty secret disables request signing.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for the HMAC signature gate; empty disables auth
    #[serde(default = "default_secret")]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum source size in bytes; 0 disables the budget
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Maximum source width in pixels; 0 disables the check
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Maximum source height in pixels; 0 disables the check
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Maximum simultaneous conversions; 0 means unbounded
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Output format used when the request names none
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_ffmpeg_command")]
    pub ffmpeg_command: String,
    #[serde(default = "default_ffprobe_command")]
    pub ffprobe_command: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secret: default_secret(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            ffmpeg_command: default_ffmpeg_command(),
            ffprobe_command: default_ffprobe_command(),
        }
    }
}

impl ServerConfig {
    /// Socket address string the HTTP server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}
