use crate::errors::ConfigError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "benchlens.yaml";
pub const DEFAULT_DB_PATH: &str = ".benchlens/benchlens.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchlensConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_cache_entries")]
    pub cache_entries: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for BenchlensConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
            retry: RetryConfig::default(),
            cache_entries: default_cache_entries(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Sqlite {
        path: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        /// Bound on one whole request, connect through body.
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_cache_entries() -> u64 {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_attempts() -> u32 {
    4
}
fn default_initial_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    4000
}
fn default_multiplier() -> f64 {
    2.0
}

impl BenchlensConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Environment variables win over file values.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("BENCHLENS_API_URL") {
            let api_key = env::var("BENCHLENS_API_KEY").ok();
            let timeout_ms = match &self.source {
                SourceConfig::Http { timeout_ms, .. } => *timeout_ms,
                SourceConfig::Sqlite { .. } => default_timeout_ms(),
            };
            self.source = SourceConfig::Http {
                base_url: v,
                api_key,
                timeout_ms,
            };
        } else if let Ok(v) = env::var("BENCHLENS_DB") {
            self.source = SourceConfig::Sqlite {
                path: PathBuf::from(v),
            };
        }
        if let Ok(v) = env::var("BENCHLENS_POLL_MS") {
            if let Ok(n) = v.parse() {
                self.poll_interval_ms = n;
            }
        }
        if let Ok(v) = env::var("BENCHLENS_LOG") {
            self.log_level = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError("poll_interval_ms must be greater than 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(ConfigError(format!(
                "retry.multiplier must be >= 1.0 (got {})",
                self.retry.multiplier
            )));
        }
        if self.cache_entries == 0 {
            return Err(ConfigError("cache_entries must be greater than 0".into()));
        }
        if let SourceConfig::Http {
            base_url,
            timeout_ms,
            ..
        } = &self.source
        {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError(format!(
                    "source.base_url must start with http:// or https:// (got '{}')",
                    base_url
                )));
            }
            if *timeout_ms == 0 {
                return Err(ConfigError("source.timeout_ms must be greater than 0".into()));
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<BenchlensConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let cfg: BenchlensConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let meaningful_unknowns: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful_unknowns.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                meaningful_unknowns,
                path.display()
            )));
        }
        tracing::warn!(
            event = "benchlens.config.unknown_fields",
            fields = ?meaningful_unknowns,
            file = %path.display(),
            "ignored unknown config fields"
        );
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Loads `path` when it exists, otherwise starts from defaults. Environment
/// overrides are applied in both cases.
pub fn load_or_default(path: &Path, strict: bool) -> Result<BenchlensConfig, ConfigError> {
    let mut cfg = if path.exists() {
        load_config(path, strict)?
    } else {
        BenchlensConfig::default()
    };
    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"# benchlens configuration
source:
  kind: sqlite
  path: .benchlens/benchlens.db
# source:
#   kind: http
#   base_url: https://bench.example.com/api
#   api_key: ${BENCHLENS_API_KEY}
#   timeout_ms: 10000
poll_interval_ms: 5000
retry:
  max_attempts: 4
  initial_delay_ms: 250
  max_delay_ms: 4000
  multiplier: 2.0
cache_entries: 64
log_level: info
log_format: text
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
