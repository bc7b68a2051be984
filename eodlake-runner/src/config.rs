//! Ingestion configuration loaded from TOML.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration. Secrets are never stored in the file: it names the
//! environment variables that hold them.

use chrono::NaiveDate;
use eodlake_core::data::{CheckpointStore, PartitionScheme, WriteMode, DEFAULT_BASE_URL};
use eodlake_core::domain::{DateRange, ResourceKind};
use eodlake_core::remote::{LocalMirror, ObjectStore, S3Credentials, S3Store};
use eodlake_core::IngestError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for IngestError {
    fn from(e: ConfigError) -> Self {
        IngestError::Configuration(e.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub provider: ProviderConfig,
    pub tickers: TickersConfig,
    pub output: OutputConfig,
    pub fetch: FetchConfig,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Environment variable holding the API token.
    pub api_key_env: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "EODHD_API_KEY".to_string(),
            requests_per_minute: 1000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TickersConfig {
    pub file: PathBuf,
    /// Suffix appended to bare symbols (`AAPL` → `AAPL.US`). Empty disables.
    pub exchange: Option<String>,
}

impl Default for TickersConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("config/tickers.txt"),
            exchange: Some("US".to_string()),
        }
    }
}

impl TickersConfig {
    pub fn default_exchange(&self) -> Option<&str> {
        self.exchange
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub filename: String,
    pub scheme: PartitionScheme,
    /// Fresh runs overwrite partitions by default; retries always upsert.
    pub mode: WriteMode,
    pub checkpoint: PathBuf,
    pub fundamentals_root: PathBuf,
    pub dividends_root: PathBuf,
    pub splits_root: PathBuf,
    pub macro_root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/prices"),
            filename: "prices.parquet".to_string(),
            scheme: PartitionScheme::Year,
            mode: WriteMode::Overwrite,
            checkpoint: PathBuf::from("data/failed_tickers.txt"),
            fundamentals_root: PathBuf::from("data/fundamentals"),
            dividends_root: PathBuf::from("data/dividends"),
            splits_root: PathBuf::from("data/splits"),
            macro_root: PathBuf::from("data/macro"),
        }
    }
}

/// Where one dataset lives locally and under the remote prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub name: &'static str,
    pub root: PathBuf,
}

impl OutputConfig {
    /// Checkpoint file for a resource kind. Prices use `checkpoint`; other
    /// kinds get a `failed_{kind}.txt` sibling.
    pub fn checkpoint_for(&self, kind: ResourceKind) -> CheckpointStore {
        match kind {
            ResourceKind::EodPrice => CheckpointStore::new(&self.checkpoint),
            other => {
                let dir = self.checkpoint.parent().unwrap_or_else(|| Path::new(""));
                CheckpointStore::new(dir.join(format!("failed_{}.txt", other.as_str())))
            }
        }
    }

    pub fn dataset(&self, kind: ResourceKind) -> Dataset {
        let (name, root) = match kind {
            ResourceKind::EodPrice => ("prices", &self.root),
            ResourceKind::Fundamentals => ("fundamentals", &self.fundamentals_root),
            ResourceKind::Dividend => ("dividends", &self.dividends_root),
            ResourceKind::Split => ("splits", &self.splits_root),
            ResourceKind::Macro => ("macro", &self.macro_root),
        };
        Dataset {
            name,
            root: root.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub start: NaiveDate,
    /// Defaults to today when absent.
    pub end: Option<NaiveDate>,
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2005, 1, 1).unwrap_or_default(),
            end: None,
            concurrency: 1,
        }
    }
}

impl FetchConfig {
    pub fn range(&self, today: NaiveDate) -> DateRange {
        DateRange::new(self.start, self.end.unwrap_or(today))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    #[default]
    S3,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    /// S3 endpoint; defaults to the regional AWS endpoint.
    pub endpoint: Option<String>,
    pub access_key_env: String,
    pub secret_key_env: String,
    /// Mirror directory for `kind = "local"`.
    pub path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::S3,
            bucket: String::new(),
            prefix: "eodlake".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_env: "AWS_ACCESS_KEY_ID".to_string(),
            secret_key_env: "AWS_SECRET_ACCESS_KEY".to_string(),
            path: None,
            timeout_secs: 120,
        }
    }
}

impl RemoteConfig {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    /// Build the configured store, resolving credentials from the environment.
    pub fn build_store(&self) -> Result<Arc<dyn ObjectStore>, IngestError> {
        match self.kind {
            RemoteKind::Local => {
                let path = self.path.clone().ok_or_else(|| {
                    IngestError::Configuration("remote.path is required for kind = \"local\"".into())
                })?;
                Ok(Arc::new(LocalMirror::new(path)))
            }
            RemoteKind::S3 => {
                let credentials =
                    S3Credentials::from_env(&self.access_key_env, &self.secret_key_env)?;
                let store = S3Store::new(
                    &self.endpoint(),
                    self.bucket.clone(),
                    self.region.clone(),
                    credentials,
                    Duration::from_secs(self.timeout_secs),
                )?;
                Ok(Arc::new(store))
            }
        }
    }
}

impl IngestConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "provider.requests_per_minute must be at least 1".into(),
            ));
        }
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "fetch.concurrency must be at least 1".into(),
            ));
        }
        if let Some(end) = self.fetch.end {
            if end < self.fetch.start {
                return Err(ConfigError::Invalid(format!(
                    "fetch.end {end} is before fetch.start {}",
                    self.fetch.start
                )));
            }
        }
        if self.output.filename.trim().is_empty() {
            return Err(ConfigError::Invalid("output.filename is empty".into()));
        }
        if let Some(remote) = &self.remote {
            match remote.kind {
                RemoteKind::S3 if remote.bucket.trim().is_empty() => {
                    return Err(ConfigError::Invalid(
                        "remote.bucket is required for kind = \"s3\"".into(),
                    ))
                }
                RemoteKind::Local if remote.path.is_none() => {
                    return Err(ConfigError::Invalid(
                        "remote.path is required for kind = \"local\"".into(),
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve the provider API token from the environment.
    pub fn api_key(&self) -> Result<String, IngestError> {
        let var = &self.provider.api_key_env;
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                IngestError::Configuration(format!("environment variable {var} is not set"))
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }
}
