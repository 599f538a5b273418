//! Application configuration: TOML file + environment overrides.
//!
//! Resolution order for the file:
//! 1) `$CURATOR_CONFIG_PATH` (must exist)
//! 2) `config/curator.toml` (optional; built-in defaults otherwise)

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::fetcher::DEFAULT_USER_AGENT;
use crate::ingest::import::FeedDescriptor;
use crate::ingest::{IngestSettings, UndatedPolicy};
use crate::model::DEFAULT_LOOKBACK_DAYS;

pub const DEFAULT_CONFIG_PATH: &str = "config/curator.toml";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HORIZON_DAYS: i64 = 7;
pub const DEFAULT_RECOMMEND_LIMIT: usize = 10;

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const ENV_BIND: &str = "CURATOR_BIND";
pub const ENV_INTERESTS_PATH: &str = "CURATOR_INTERESTS_PATH";
pub const ENV_SNAPSHOT_PATH: &str = "CURATOR_SNAPSHOT_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub fetch: FetchConfig,
    pub ingest: IngestConfig,
    pub analyzer: AnalyzerConfig,
    pub feeds: FeedsConfig,
    pub recommend: RecommendConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub default_days: i64,
    pub undated: UndatedPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_LOOKBACK_DAYS,
            undated: UndatedPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub interests_path: Option<PathBuf>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub opml_path: Option<PathBuf>,
    pub sources: Vec<FeedDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub horizon_days: i64,
    pub default_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            default_limit: DEFAULT_RECOMMEND_LIMIT,
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Resolve, parse, apply env overrides and sanitise.
    pub fn load() -> Result<Self> {
        let (path, explicit) = match env_non_empty(ENV_CONFIG_PATH) {
            Some(p) => (PathBuf::from(p), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut cfg = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            let cfg = Self::from_toml_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?;
            tracing::info!(target: "config", path = %path.display(), "config loaded");
            cfg
        } else if explicit {
            return Err(anyhow!(
                "{ENV_CONFIG_PATH} points to non-existent path {}",
                path.display()
            ));
        } else {
            tracing::info!(target: "config", "no config file, using defaults");
            Self::default()
        };

        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(bind) = env_non_empty(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Some(p) = env_non_empty(ENV_INTERESTS_PATH) {
            self.analyzer.interests_path = Some(PathBuf::from(p));
        }
        if let Some(p) = env_non_empty(ENV_SNAPSHOT_PATH) {
            self.store.snapshot_path = Some(PathBuf::from(p));
        }
    }

    /// Replace out-of-range values with defaults.
    pub fn sanitize(&mut self) {
        if self.ingest.default_days <= 0 {
            tracing::warn!(target: "config", value = self.ingest.default_days, "ingest.default_days must be > 0, using default");
            self.ingest.default_days = DEFAULT_LOOKBACK_DAYS;
        }
        if self.fetch.timeout_secs == 0 {
            tracing::warn!(target: "config", "fetch.timeout_secs must be > 0, using default");
            self.fetch.timeout_secs = DEFAULT_FETCH_TIMEOUT_SECS;
        }
        if self.fetch.user_agent.trim().is_empty() {
            self.fetch.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        if self.recommend.horizon_days <= 0 {
            tracing::warn!(target: "config", value = self.recommend.horizon_days, "recommend.horizon_days must be > 0, using default");
            self.recommend.horizon_days = DEFAULT_HORIZON_DAYS;
        }
        if self.recommend.default_limit == 0 {
            tracing::warn!(target: "config", "recommend.default_limit must be > 0, using default");
            self.recommend.default_limit = DEFAULT_RECOMMEND_LIMIT;
        }
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            default_days: self.ingest.default_days,
            undated: self.ingest.undated,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}
