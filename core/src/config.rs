use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DATABASE_ENV: &str = "CASEWORK_DATABASE";
pub const WEBHOOK_URL_ENV: &str = "CASEWORK_WEBHOOK_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub webhook: WebhookConfig,
    pub spreadsheet: SheetLabels,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Constant labels written into every spreadsheet row, plus the filename
/// advertised on download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetLabels {
    pub section: String,
    pub sub_section: String,
    pub download_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("casework.db"),
            webhook: WebhookConfig::default(),
            spreadsheet: SheetLabels::default(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5678/webhook-test/export-to-n8n".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SheetLabels {
    fn default() -> Self {
        Self {
            section: "Test Cases".to_string(),
            sub_section: "General".to_string(),
            download_filename: "export.xlsx".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Config {
    pub fn from_yaml_str(source: &str) -> Result<Self, serde_yaml::Error> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source)
    }

    /// Reads the YAML file at `path` (defaults when it does not exist) and
    /// applies environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => match fs::read_to_string(path) {
                Ok(source) => Self::from_yaml_str(&source).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    log::debug!("config {:?} not found, using defaults", path);
                    Self::default()
                }
                Err(source) => {
                    return Err(ConfigError::Read {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            },
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DATABASE_ENV).filter(|value| !value.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = lookup(WEBHOOK_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.webhook.endpoint = url;
        }
    }
}
