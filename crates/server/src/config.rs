use ecotag_core::{FactorError, FactorTable};
use ecotag_scan::OpenAiSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "ecotag.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
    #[error(transparent)]
    Factors(#[from] FactorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" | "bunyan" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        let defaults = OpenAiSettings::default();
        Self {
            api_key: None,
            model: defaults.model,
            base_url: defaults.base_url,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl OpenAiConfig {
    pub fn settings(&self) -> OpenAiSettings {
        OpenAiSettings {
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Defaults to `ecotag.db` in the platform data directory.
    pub database_path: Option<PathBuf>,
    pub db_max_connections: u32,
    pub cache_max_entries: u32,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
    /// Optional TOML overlay for the emission-factor table.
    pub factors_path: Option<PathBuf>,
    pub openai: OpenAiConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            database_path: None,
            db_max_connections: 4,
            cache_max_entries: ecotag_storage::DEFAULT_CACHE_MAX_ENTRIES,
            max_upload_bytes: 10 * 1024 * 1024,
            log_format: LogFormat::Text,
            factors_path: None,
            openai: OpenAiConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the TOML file named by `ECOTAG_CONFIG` (or
    /// `ecotag.toml` if present), then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("ECOTAG_CONFIG").ok().map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = var("ECOTAG_BIND") {
            self.bind = bind;
        }
        if let Some(path) = var("ECOTAG_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(value) = var("ECOTAG_CACHE_MAX_ENTRIES") {
            self.cache_max_entries = parse_env("ECOTAG_CACHE_MAX_ENTRIES", &value)?;
        }
        if let Some(path) = var("ECOTAG_FACTORS") {
            self.factors_path = Some(PathBuf::from(path));
        }
        if let Some(value) = var("ECOTAG_LOG_FORMAT") {
            self.log_format = parse_env("ECOTAG_LOG_FORMAT", &value)?;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(model) = var("OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        directories::ProjectDirs::from("com", "ecotag", "EcoTag")
            .map(|dirs| dirs.data_dir().join("ecotag.db"))
            .unwrap_or_else(|| PathBuf::from("ecotag.db"))
    }

    pub fn factor_table(&self) -> Result<FactorTable, ConfigError> {
        let Some(path) = &self.factors_path else {
            return Ok(FactorTable::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(FactorTable::from_toml(&content)?)
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}
