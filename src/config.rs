//! Configuration types, read from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub apify: ApifyConfig,
    pub llm: crate::llm::LlmConfig,
    pub retailers: RetailerConfig,
    pub search: SearchConfig,
}

impl AppConfig {
    /// Load everything from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            apify: ApifyConfig::from_env()?,
            llm: crate::llm::LlmConfig::from_env()?,
            retailers: RetailerConfig::from_env(),
            search: SearchConfig::from_env()?,
        })
    }
}

/// HTTP server and storage settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub db_path: PathBuf,
    /// Directory for daily-rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind: std::env::var("GIFTWISE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            db_path: std::env::var("GIFTWISE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/giftwise.db")),
            log_dir: std::env::var("GIFTWISE_LOG_DIR").ok().map(PathBuf::from),
        })
    }
}

/// Apify actor-run settings.
#[derive(Debug, Clone)]
pub struct ApifyConfig {
    /// `None` disables scraping entirely.
    pub token: Option<SecretString>,
    pub base_url: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub max_posts: usize,
    /// Completed scrapes younger than this are reused.
    pub cache_window: Duration,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://api.apify.com".to_string(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
            max_posts: 30,
            cache_window: Duration::from_secs(24 * 3600),
        }
    }
}

impl ApifyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            token: std::env::var("APIFY_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(SecretString::from),
            base_url: std::env::var("APIFY_BASE_URL").unwrap_or(defaults.base_url),
            poll_interval: Duration::from_secs(env_parse("APIFY_POLL_INTERVAL_SECS", 5u64)?),
            timeout: Duration::from_secs(env_parse("APIFY_TIMEOUT_SECS", 120u64)?),
            max_posts: env_parse("APIFY_MAX_POSTS", defaults.max_posts)?,
            cache_window: env_hours("SCRAPE_CACHE_HOURS", 24)?,
        })
    }
}

/// Affiliate API credentials. Each retailer is enabled only when its key is set.
#[derive(Debug, Clone, Default)]
pub struct RetailerConfig {
    pub etsy_api_key: Option<SecretString>,
    pub ebay_access_token: Option<SecretString>,
    pub ebay_campaign_id: Option<String>,
    pub rainforest_api_key: Option<SecretString>,
    pub amazon_associate_tag: Option<String>,
}

impl RetailerConfig {
    pub fn from_env() -> Self {
        let secret = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(SecretString::from)
        };
        Self {
            etsy_api_key: secret("ETSY_API_KEY"),
            ebay_access_token: secret("EBAY_ACCESS_TOKEN"),
            ebay_campaign_id: std::env::var("EBAY_CAMPAIGN_ID").ok(),
            rainforest_api_key: secret("RAINFOREST_API_KEY"),
            amazon_associate_tag: std::env::var("AMAZON_ASSOCIATE_TAG").ok(),
        }
    }
}

/// Caps applied to retailer search and curation.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Results requested from each retailer per query.
    pub per_retailer_limit: usize,
    /// Search queries taken from the gift profile.
    pub max_queries: usize,
    /// Candidate pool size handed to curation.
    pub max_candidates: usize,
    pub shortlist_size: usize,
    pub max_per_retailer: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_retailer_limit: 8,
            max_queries: 6,
            max_candidates: 60,
            shortlist_size: 8,
            max_per_retailer: 4,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            per_retailer_limit: env_parse("SEARCH_PER_RETAILER_LIMIT", d.per_retailer_limit)?,
            max_queries: env_parse("SEARCH_MAX_QUERIES", d.max_queries)?,
            max_candidates: env_parse("SEARCH_MAX_CANDIDATES", d.max_candidates)?,
            shortlist_size: env_parse("SHORTLIST_SIZE", d.shortlist_size)?,
            max_per_retailer: env_parse("SHORTLIST_MAX_PER_RETAILER", d.max_per_retailer)?,
        })
    }
}

/// Parse an optional environment variable, falling back to `default` when unset.
pub(crate) fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// A whole number of hours from the environment.
pub(crate) fn env_hours(key: &str, default: u64) -> Result<Duration, ConfigError> {
    env_parse(key, default)?
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: "too many hours".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_uses_default_when_unset() {
        // SAFETY: unique variable name, no other test touches it.
        unsafe { std::env::remove_var("GIFTWISE_TEST_UNSET_VALUE") };
        assert_eq!(env_parse("GIFTWISE_TEST_UNSET_VALUE", 7usize).unwrap(), 7);
    }

    #[test]
    fn env_parse_rejects_garbage() {
        // SAFETY: unique variable name, no other test touches it.
        unsafe { std::env::set_var("GIFTWISE_TEST_BAD_VALUE", "twelve") };
        let err = env_parse("GIFTWISE_TEST_BAD_VALUE", 1u64).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GIFTWISE_TEST_BAD_VALUE"));
    }

    #[test]
    fn env_parse_reads_value() {
        // SAFETY: unique variable name, no other test touches it.
        unsafe { std::env::set_var("GIFTWISE_TEST_GOOD_VALUE", " 42 ") };
        assert_eq!(env_parse("GIFTWISE_TEST_GOOD_VALUE", 1u64).unwrap(), 42);
    }

    #[test]
    fn env_hours_converts_and_rejects_overflow() {
        // SAFETY: unique variable names, no other test touches them.
        unsafe { std::env::set_var("GIFTWISE_TEST_HOURS", "2") };
        assert_eq!(env_hours("GIFTWISE_TEST_HOURS", 24).unwrap(), Duration::from_secs(7200));

        unsafe { std::env::set_var("GIFTWISE_TEST_HUGE_HOURS", u64::MAX.to_string()) };
        let err = env_hours("GIFTWISE_TEST_HUGE_HOURS", 24).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GIFTWISE_TEST_HUGE_HOURS"));
    }

    #[test]
    fn search_defaults() {
        let cfg = SearchConfig::default();
        assert_eq!(cfg.shortlist_size, 8);
        assert!(cfg.max_per_retailer <= cfg.shortlist_size);
    }
}
