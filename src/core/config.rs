use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// A saved 2030 target for one display symbol.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TargetConfig {
    /// Target market cap in billions.
    pub market_cap: f64,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_true")]
    pub convert_to_usd: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_target_multiplier")]
    pub target_multiplier: f64,
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    #[serde(default = "default_true")]
    pub persist_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            symbols: default_symbols(),
            targets: BTreeMap::new(),
            providers: ProvidersConfig::default(),
            convert_to_usd: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            target_multiplier: default_target_multiplier(),
            history_days: default_history_days(),
            persist_cache: true,
            data_path: None,
        }
    }
}

fn default_symbols() -> Vec<String> {
    ["AAPL", "TSLA", "NVDA", "BTC-USD"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_target_multiplier() -> f64 {
    5.0
}

fn default_history_days() -> u32 {
    5
}

fn default_retries() -> usize {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "cagr2030").context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    /// The explicit path if one is given, the platform default otherwise.
    pub fn resolve_path(config_path: Option<&str>) -> Result<PathBuf> {
        match config_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Self::default_config_path(),
        }
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Like `load_from_path`, but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            debug!(
                "No config at {}, using defaults",
                path.as_ref().display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    pub fn save_to_path<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let config_str = serde_yaml::to_string(self).context("Failed to serialize config")?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path.as_ref(), config_str)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        debug!("Saved config to {}", path.as_ref().display());
        Ok(())
    }

    /// Rejects values that would produce targets no edit could save.
    pub fn validate(&self) -> Result<()> {
        if !self.target_multiplier.is_finite() || self.target_multiplier <= 0.0 {
            bail!(
                "target_multiplier must be a positive number, got {}",
                self.target_multiplier
            );
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn yahoo(&self) -> YahooProviderConfig {
        self.providers.yahoo.clone().unwrap_or_default()
    }
}
