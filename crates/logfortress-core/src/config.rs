//! Configuration management.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::registry::REGISTRY_FILE_NAME;
use crate::{Error, Result};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "LOGFORTRESS_CONFIG_DIR";

const APP_NAME: &str = "logfortress";
const CONFIG_FILE_NAME: &str = "config.json";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `config.json` and the custom source registry.
    #[serde(skip)]
    pub config_dir: PathBuf,
    /// Docker socket path.
    #[serde(default)]
    pub docker_socket: Option<String>,
    /// Log streaming behaviour.
    #[serde(default)]
    pub streaming: StreamOptions,
}

/// Tunables for live log streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// How much history native mode replays before following (`"all"` or a line count).
    pub tail: String,
    /// Capacity of the channel between the origin and the consumer.
    pub buffer_lines: usize,
    /// An unterminated line is flushed once it grows past this many bytes.
    pub max_line_bytes: usize,
    /// Command prefix run inside the container for custom sources; the path is appended.
    pub follow_command: Vec<String>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            tail: "all".to_string(),
            buffer_lines: 256,
            max_line_bytes: 1024 * 1024,
            follow_command: vec!["tail".to_string(), "-f".to_string()],
        }
    }
}

impl StreamOptions {
    /// Full argv used to follow `path` inside a container.
    pub fn follow_argv(&self, path: &str) -> Vec<String> {
        let mut argv = self.follow_command.clone();
        argv.push(path.to_string());
        argv
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            docker_socket: None,
            streaming: StreamOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from the resolved config directory, or defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::resolve_config_dir()?)
    }

    /// Load configuration from an explicit directory, creating it if absent.
    pub fn load_from(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        ensure_dir(&config_dir)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                Error::Config(format!("failed to read {}: {e}", config_path.display()))
            })?;
            serde_json::from_str::<Self>(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {e}", config_path.display()))
            })?
        } else {
            Self::default()
        };

        config.config_dir = config_dir;
        Ok(config)
    }

    /// Default configuration rooted at `config_dir`.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    /// Path of the custom log source registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.config_dir.join(REGISTRY_FILE_NAME)
    }

    /// Resolve the per-user configuration directory and create it if needed.
    ///
    /// `LOGFORTRESS_CONFIG_DIR` wins over the platform default.
    pub fn resolve_config_dir() -> Result<PathBuf> {
        let dir = std::env::var_os(CONFIG_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map_or_else(default_config_dir, PathBuf::from);
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

fn default_config_dir() -> PathBuf {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".logfortress"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!(
            "could not create config directory {}: {e}",
            dir.display()
        ))
    })
}
