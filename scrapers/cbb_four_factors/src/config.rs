use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteConfig {
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.sports-reference.com/cbb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimits {
    /// Minimum gap between two requests to the site.
    pub request_interval_ms: u64,
    pub max_retries: u32,
    /// Used when a 429 carries no usable Retry-After header.
    pub default_retry_after_secs: u64,
    /// Upper bound on any Retry-After wait.
    pub max_retry_after_secs: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            request_interval_ms: 3000,
            max_retries: 3,
            default_retry_after_secs: 60,
            max_retry_after_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapingConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; CbbFourFactors/0.1)".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub ensemble_size: usize,
    pub games_per_day_cap: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            ensemble_size: 100,
            games_per_day_cap: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScraperConfig {
    pub site: SiteConfig,
    pub rate_limits: RateLimits,
    pub scraping: ScrapingConfig,
    pub training: TrainingConfig,
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl ScraperConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = env::var("CBB_BASE_URL") {
            config.site.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(interval) = parsed_var::<u64>("RATE_LIMIT_INTERVAL_MS") {
            config.rate_limits.request_interval_ms = interval;
        }
        if let Some(retries) = parsed_var::<u32>("RATE_LIMIT_MAX_RETRIES") {
            config.rate_limits.max_retries = retries;
        }
        if let Some(secs) = parsed_var::<u64>("RATE_LIMIT_MAX_RETRY_AFTER_SECS") {
            config.rate_limits.max_retry_after_secs = secs;
        }
        if let Ok(user_agent) = env::var("SCRAPER_USER_AGENT") {
            config.scraping.user_agent = user_agent;
        }
        if let Some(timeout) = parsed_var::<u64>("SCRAPER_TIMEOUT_SECS") {
            config.scraping.request_timeout_secs = timeout;
        }
        if let Some(seed) = parsed_var::<u64>("TRAIN_SEED") {
            config.training.seed = seed;
        }
        if let Some(fraction) = parsed_var::<f64>("TRAIN_TEST_FRACTION") {
            if fraction > 0.0 && fraction < 1.0 {
                config.training.test_fraction = fraction;
            }
        }
        if let Some(trees) = parsed_var::<usize>("TRAIN_ENSEMBLE_SIZE") {
            config.training.ensemble_size = trees;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::default();
        assert_eq!(config.site.base_url, "https://www.sports-reference.com/cbb");
        assert_eq!(config.rate_limits.request_interval_ms, 3000);
        assert!(config.rate_limits.default_retry_after_secs <= config.rate_limits.max_retry_after_secs);
        assert_eq!(config.training.seed, 42);
        assert!((config.training.test_fraction - 0.2).abs() < f64::EPSILON);
    }
}
