use crate::core::rates::RateKind;
use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://www.tcmb.gov.tr";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over a TCP listener.
    Tcp,
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" | "pipe" => Ok(Transport::Stdio),
            "tcp" | "http" | "network" | "streamable" => Ok(Transport::Tcp),
            other => Err(anyhow!("Invalid transport: {other}")),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: Option<String>,
    pub ttl_today: u64,
    pub ttl_historical: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            path: None,
            ttl_today: 3600,
            ttl_historical: 31_536_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    /// Per-attempt timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    /// Initial backoff in seconds, doubled after every attempt.
    pub retry_delay: f64,
    /// Minimum seconds between two requests to the feed.
    pub request_delay: f64,
    pub max_concurrent_fetches: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: 10,
            max_retries: 3,
            retry_delay: 1.0,
            request_delay: 0.1,
            max_concurrent_fetches: 4,
        }
    }
}

/// Which rate kind each leg of a conversion reads.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ConversionConfig {
    /// Leg from the source currency into TRY.
    pub source_leg: RateKind,
    /// Leg from TRY into the target currency.
    pub target_leg: RateKind,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        ConversionConfig {
            source_leg: RateKind::ForexSelling,
            target_leg: RateKind::ForexBuying,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            transport: Transport::Stdio,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub feed: FeedConfig,
    pub conversion: ConversionConfig,
    pub server: ServerConfig,
    pub debug: bool,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Loads the config file (when present) and applies environment overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = Self::default_config_path()?;
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    debug!("No config file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };
        config.apply_env(std::env::vars())?;
        debug!("Loaded config: {config:#?}");
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("tr", "tcmb", "tcmb-mcp")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Directory of the on-disk rate cache.
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.cache.path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("tr", "tcmb", "tcmb-mcp")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.cache_dir().join("rates"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Applies `TCMB_*`, `MCP_TRANSPORT`, `HOST` and `PORT` overrides.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "TCMB_CACHE_ENABLED" => self.cache.enabled = parse_bool(&key, &value)?,
                "TCMB_CACHE_DB_PATH" => self.cache.path = Some(value),
                "TCMB_CACHE_TTL_TODAY" => self.cache.ttl_today = parse_env(&key, &value)?,
                "TCMB_CACHE_TTL_HISTORICAL" => {
                    self.cache.ttl_historical = parse_env(&key, &value)?
                }
                "TCMB_BASE_URL" => self.feed.base_url = value,
                "TCMB_TIMEOUT" => self.feed.timeout = parse_env(&key, &value)?,
                "TCMB_MAX_RETRIES" => self.feed.max_retries = parse_env(&key, &value)?,
                "TCMB_RETRY_DELAY" => self.feed.retry_delay = parse_env(&key, &value)?,
                "TCMB_REQUEST_DELAY" => self.feed.request_delay = parse_env(&key, &value)?,
                "TCMB_MAX_CONCURRENT_FETCHES" => {
                    self.feed.max_concurrent_fetches = parse_env(&key, &value)?
                }
                "TCMB_DEBUG" => self.debug = parse_bool(&key, &value)?,
                "TCMB_LOG_LEVEL" => self.log_level = Some(value.to_lowercase()),
                "MCP_TRANSPORT" => self.server.transport = value.parse()?,
                "HOST" => self.server.host = value,
                "PORT" => self.server.port = parse_env(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn ttl_today(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_today)
    }

    pub fn ttl_historical(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_historical)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value '{value}' for {key}: {e}"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid boolean '{value}' for {key}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.ttl_today(), Duration::from_secs(3600));
        assert_eq!(config.ttl_historical(), Duration::from_secs(31_536_000));
        assert_eq!(config.feed.timeout, 10);
        assert_eq!(config.feed.max_retries, 3);
        assert_eq!(config.feed.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.server.transport, Transport::Stdio);
        assert_eq!(config.conversion.source_leg, RateKind::ForexSelling);
        assert_eq!(config.conversion.target_leg, RateKind::ForexBuying);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
cache:
  enabled: false
  path: "/tmp/tcmb-cache"
  ttl_today: 60
feed:
  base_url: "http://example.com"
  max_retries: 1
conversion:
  source_leg: banknote_selling
server:
  transport: tcp
  port: 9000
debug: true
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.path.as_deref(), Some("/tmp/tcmb-cache"));
        assert_eq!(config.cache.ttl_today, 60);
        // Unset fields keep their defaults
        assert_eq!(config.cache.ttl_historical, 31_536_000);
        assert_eq!(config.feed.base_url, "http://example.com");
        assert_eq!(config.feed.max_retries, 1);
        assert_eq!(config.feed.timeout, 10);
        assert_eq!(config.conversion.source_leg, RateKind::BanknoteSelling);
        assert_eq!(config.conversion.target_leg, RateKind::ForexBuying);
        assert_eq!(config.server.transport, Transport::Tcp);
        assert_eq!(config.server.port, 9000);
        assert!(config.debug);
        assert_eq!(config.cache_path().unwrap(), PathBuf::from("/tmp/tcmb-cache"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(vars(&[
                ("TCMB_CACHE_ENABLED", "false"),
                ("TCMB_CACHE_DB_PATH", "/var/cache/tcmb"),
                ("TCMB_CACHE_TTL_TODAY", "120"),
                ("TCMB_CACHE_TTL_HISTORICAL", "86400"),
                ("TCMB_TIMEOUT", "5"),
                ("TCMB_MAX_RETRIES", "0"),
                ("TCMB_RETRY_DELAY", "0.25"),
                ("TCMB_REQUEST_DELAY", "0.5"),
                ("TCMB_DEBUG", "1"),
                ("TCMB_LOG_LEVEL", "WARN"),
                ("MCP_TRANSPORT", "http"),
                ("PORT", "3000"),
                ("UNRELATED", "ignored"),
            ]))
            .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.path.as_deref(), Some("/var/cache/tcmb"));
        assert_eq!(config.cache.ttl_today, 120);
        assert_eq!(config.cache.ttl_historical, 86400);
        assert_eq!(config.feed.timeout, 5);
        assert_eq!(config.feed.max_retries, 0);
        assert_eq!(config.feed.retry_delay, 0.25);
        assert_eq!(config.feed.request_delay, 0.5);
        assert!(config.debug);
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(config.server.transport, Transport::Tcp);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_invalid_env_values_fail() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(vars(&[("TCMB_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("TCMB_TIMEOUT"));

        assert!(config.apply_env(vars(&[("TCMB_DEBUG", "maybe")])).is_err());
        assert!(config.apply_env(vars(&[("MCP_TRANSPORT", "carrier-pigeon")])).is_err());
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let result = AppConfig::load_from_path("/nonexistent/tcmb/config.yaml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }
}
