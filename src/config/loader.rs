//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml
//! structure. Every section has working defaults, so a minimal file (or an
//! empty one) yields a runnable configuration; API keys come from the
//! environment when the file does not carry them.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::chain::Chain;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collector: CollectorSection,
    #[serde(default)]
    pub budget: BudgetSection,
    #[serde(default)]
    pub backfill: BackfillSection,
    #[serde(default)]
    pub thresholds: ThresholdsSection,
    #[serde(default)]
    pub price: PriceSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Per-chain sections keyed by chain id ("ethereum", "bsc", "polygon")
    #[serde(default)]
    pub chains: HashMap<String, ChainSection>,
}

/// Poll loop configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSection {
    /// Blocks the backfill cursor is seeded behind head on first use
    pub batch_size: u64,
    /// Fetch attempts per block before it is skipped
    pub max_block_retries: u32,
    /// First retry delay; doubles per attempt
    pub retry_base_delay_ms: u64,
    /// How long stop waits for a loop to drain before aborting it
    pub drain_timeout_secs: u64,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_block_retries: 3,
            retry_base_delay_ms: 500,
            drain_timeout_secs: 10,
        }
    }
}

/// Daily API budget section
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetSection {
    /// Upstream calls allowed per collector per UTC day
    pub daily_limit: u64,
    /// Calls withheld from backfill so live detection never starves
    pub safety_buffer: u64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            daily_limit: 100_000,
            safety_buffer: 2_000,
        }
    }
}

/// Historical backfill section
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillSection {
    pub enabled: bool,
    /// UTC hour (0-23) during which backfill spends the whole allowance
    pub intensive_hour: u32,
    /// Block number backfill works down to (exclusive)
    pub target_block: u64,
    /// Pacing delay between calls inside an intensive session
    pub intensive_call_delay_ms: u64,
}

impl Default for BackfillSection {
    fn default() -> Self {
        Self {
            enabled: true,
            intensive_hour: 3,
            target_block: 0,
            intensive_call_delay_ms: 250,
        }
    }
}

/// Whale threshold section
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsSection {
    /// USD threshold applied to symbols without an explicit entry
    pub default_usd: f64,
    /// Per-symbol USD thresholds, e.g. ETH = 2000000.0
    #[serde(default)]
    pub symbols: HashMap<String, f64>,
}

impl Default for ThresholdsSection {
    fn default() -> Self {
        Self {
            default_usd: 1_000_000.0,
            symbols: HashMap::new(),
        }
    }
}

/// Price oracle section
#[derive(Debug, Clone, Deserialize)]
pub struct PriceSection {
    pub api_url: String,
    pub refresh_interval_secs: u64,
}

impl Default for PriceSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            refresh_interval_secs: 60,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Per-chain overrides; a chain absent from the file uses its descriptor
/// defaults and is enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explorer API base URL override
    #[serde(default)]
    pub api_url: Option<String>,
    /// Explorer API key; the chain's credential env var is the fallback
    #[serde(default)]
    pub api_key: Option<String>,
    /// Poll interval override in seconds
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: None,
            api_key: None,
            poll_interval_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch_size must be > 0".to_string(),
            ));
        }

        if self.budget.daily_limit == 0 {
            return Err(ConfigError::ValidationError(
                "daily_limit must be > 0".to_string(),
            ));
        }

        if self.budget.safety_buffer >= self.budget.daily_limit {
            return Err(ConfigError::ValidationError(format!(
                "safety_buffer {} must be below daily_limit {}",
                self.budget.safety_buffer, self.budget.daily_limit
            )));
        }

        if self.backfill.intensive_hour > 23 {
            return Err(ConfigError::ValidationError(format!(
                "intensive_hour must be 0-23, got {}",
                self.backfill.intensive_hour
            )));
        }

        if self.thresholds.default_usd <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "default_usd threshold must be > 0, got {}",
                self.thresholds.default_usd
            )));
        }

        for (symbol, threshold) in &self.thresholds.symbols {
            if *threshold <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "threshold for {} must be > 0, got {}",
                    symbol, threshold
                )));
            }
        }

        if self.price.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "price api_url cannot be empty".to_string(),
            ));
        }

        for id in self.chains.keys() {
            if Chain::from_id(id).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "unknown chain section [chains.{}]",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Section for a chain, or the defaults when the file has none
    pub fn chain_section(&self, chain: Chain) -> ChainSection {
        self.chains.get(chain.id()).cloned().unwrap_or_default()
    }
}

impl ChainSection {
    /// API key with environment variable fallback. The env var name
    /// comes from the chain's descriptor.
    pub fn resolve_api_key(&self, chain: Chain) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var(chain.descriptor().credential_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Serializes tests that read or mutate process environment variables;
/// `std::env::set_var` is not safe against concurrent readers.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> String {
        r#"
[collector]
batch_size = 25
max_block_retries = 3
retry_base_delay_ms = 500
drain_timeout_secs = 10

[budget]
daily_limit = 100000
safety_buffer = 2000

[backfill]
enabled = true
intensive_hour = 3
target_block = 0
intensive_call_delay_ms = 250

[thresholds]
default_usd = 1000000.0

[thresholds.symbols]
ETH = 2000000.0

[price]
api_url = "https://api.coingecko.com/api/v3/simple/price"
refresh_interval_secs = 60

[logging]
level = "info"

[chains.ethereum]
enabled = true
api_key = "testkey"

[chains.bsc]
enabled = false
"#
        .to_string()
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.collector.batch_size, 25);
        assert_eq!(config.thresholds.symbols["ETH"], 2_000_000.0);
        assert!(config.chain_section(Chain::Ethereum).enabled);
        assert!(!config.chain_section(Chain::Bsc).enabled);
        // Polygon has no section and falls back to defaults
        assert!(config.chain_section(Chain::Polygon).enabled);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.budget.daily_limit, 100_000);
        assert_eq!(config.backfill.intensive_hour, 3);
        assert_eq!(config.thresholds.default_usd, 1_000_000.0);
    }

    #[test]
    fn test_rejects_buffer_above_limit() {
        let config = Config {
            budget: BudgetSection {
                daily_limit: 100,
                safety_buffer: 100,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_intensive_hour() {
        let config = Config {
            backfill: BackfillSection {
                intensive_hour: 24,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_chain_section() {
        let mut config = Config::default();
        config
            .chains
            .insert("dogecoin".to_string(), ChainSection::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_env_fallback() {
        let _env = env_lock();
        let section = ChainSection {
            api_key: Some("from-file".to_string()),
            ..Default::default()
        };
        assert_eq!(
            section.resolve_api_key(Chain::Ethereum),
            Some("from-file".to_string())
        );

        // Empty file value falls through to the environment
        let section = ChainSection {
            api_key: Some(String::new()),
            ..Default::default()
        };
        std::env::set_var("BSCSCAN_API_KEY", "from-env");
        assert_eq!(
            section.resolve_api_key(Chain::Bsc),
            Some("from-env".to_string())
        );
        std::env::remove_var("BSCSCAN_API_KEY");
    }
}
