use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::host::Corner;
use crate::error::ConfigurationError;
use crate::prompts::WELCOME_MESSAGE;

/// Environment variables checked, in order, when no key is in the file.
pub const API_KEY_ENV_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_WIDGET_NAME: &str = "prevtech-ai";

/// Main widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion service key; falls back to the environment when absent
    pub api_key: Option<String>,

    /// Model used for `generateContent`
    pub model: String,

    /// Base URL of the Generative Language API
    pub base_url: String,

    /// Upper bound for one completion call
    pub request_timeout_secs: u64,

    pub sampling: SamplingConfig,

    pub widget: WidgetConfig,

    /// Widget home directory (config file, logs)
    #[serde(skip)]
    pub home: PathBuf,

    /// Whether `load_from` found a file, or fell back to defaults
    #[serde(skip)]
    pub file_found: bool,
}

/// Sampling parameters attached to every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

/// Embedding and panel behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Prefix of the `<name>-open` / `<name>-close` messages
    pub name: String,

    /// Screen corner the panel is anchored to
    pub anchor: Corner,

    /// Close the panel after a message is sent
    pub close_on_send: bool,

    /// Origins the bridge posts to; empty means any origin
    pub trusted_origins: Vec<String>,

    /// File or FIFO receiving bridge messages; none means no host is attached
    pub bridge_output: Option<PathBuf>,

    pub welcome_message: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_WIDGET_NAME.to_string(),
            anchor: Corner::BottomRight,
            close_on_send: false,
            trusted_origins: Vec::new(),
            bridge_output: None,
            welcome_message: WELCOME_MESSAGE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            sampling: SamplingConfig::default(),
            widget: WidgetConfig::default(),
            home: Self::default_home(),
            file_found: false,
        }
    }
}

impl Config {
    /// `~/.prevtech-ai`
    pub fn default_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prevtech-ai")
    }

    pub fn default_path() -> PathBuf {
        Self::default_home().join("config.toml")
    }

    /// Load from the default location, or defaults when no file exists
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`, or defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigurationError> {
        let home = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_home);

        let file_found = path.exists();
        let mut config = if file_found {
            let content = fs::read_to_string(path).map_err(|source| ConfigurationError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str::<Config>(&content).map_err(|source| ConfigurationError::ParseFile {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Config::default()
        };

        config.home = home;
        config.file_found = file_found;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the filesystem
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        let config = toml::from_str::<Config>(content).map_err(|source| {
            ConfigurationError::ParseFile {
                path: "<inline>".to_string(),
                source,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `<home>/config.toml`
    pub fn save(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.home).context("Failed to create widget home directory")?;
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(config_path)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.widget.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "widget.name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.sampling.top_p) {
            return Err(ConfigurationError::InvalidValue {
                field: "sampling.top_p",
                reason: format!("{} is outside 0.0..=1.0", self.sampling.top_p),
            });
        }
        Ok(())
    }

    /// API key from the config file or the process environment
    pub fn api_key(&self) -> Result<String, ConfigurationError> {
        self.resolve_api_key(|name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_api_key<F>(&self, lookup: F) -> Result<String, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .or_else(|| API_KEY_ENV_VARS.iter().find_map(|name| lookup(name)))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigurationError::MissingApiKey)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join("widget.log")
    }
}
