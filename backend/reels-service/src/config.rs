/// Configuration management for reels-service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub feed: FeedConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Feed pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// TTL for personalized/following feed cache entries (seconds)
    #[serde(default = "default_feed_ttl")]
    pub feed_ttl_secs: u64,
    /// TTL for trending feed cache entries (seconds)
    #[serde(default = "default_trending_ttl")]
    pub trending_ttl_secs: u64,
    /// Most recent view rows retained per user
    #[serde(default = "default_view_history_cap")]
    pub view_history_cap: i64,
    /// Candidate age cutoff for the trending tier (days)
    #[serde(default = "default_trending_candidate_days")]
    pub trending_candidate_days: i64,
    /// Interaction count below which a user is cold-start
    #[serde(default = "default_cold_start_interactions")]
    pub cold_start_min_interactions: i64,
    /// Account age (days) below which a user is cold-start
    #[serde(default = "default_cold_start_account_days")]
    pub cold_start_min_account_days: i64,
    /// Interval for the periodic preference recompute job (seconds);
    /// 0 disables the job
    #[serde(default = "default_preference_refresh_secs")]
    pub preference_refresh_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_feed_ttl() -> u64 {
    300
}

fn default_trending_ttl() -> u64 {
    600
}

fn default_view_history_cap() -> i64 {
    50
}

fn default_trending_candidate_days() -> i64 {
    7
}

fn default_cold_start_interactions() -> i64 {
    3
}

fn default_cold_start_account_days() -> i64 {
    7
}

fn default_preference_refresh_secs() -> u64 {
    0
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed_ttl_secs: default_feed_ttl(),
            trending_ttl_secs: default_trending_ttl(),
            view_history_cap: default_view_history_cap(),
            trending_candidate_days: default_trending_candidate_days(),
            cold_start_min_interactions: default_cold_start_interactions(),
            cold_start_min_account_days: default_cold_start_account_days(),
            preference_refresh_secs: default_preference_refresh_secs(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let env_var = |name: &str| std::env::var(name).ok();

        Ok(Config {
            app: AppConfig {
                env: env_var("APP_ENV").unwrap_or_else(|| "development".to_string()),
                host: env_var("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: env_var("APP_PORT")
                    .unwrap_or_else(|| "8080".to_string())
                    .parse()
                    .context("APP_PORT must be a valid port number")?,
            },
            database: DatabaseConfig {
                url: env_var("DATABASE_URL")
                    .context("DATABASE_URL must be set")?,
                max_connections: env_var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| default_max_connections().to_string())
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be an integer")?,
            },
            redis: RedisConfig {
                url: env_var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            },
            feed: FeedConfig {
                feed_ttl_secs: env_var("FEED_CACHE_TTL_SECS")
                    .unwrap_or_else(|| default_feed_ttl().to_string())
                    .parse()
                    .context("FEED_CACHE_TTL_SECS must be an integer")?,
                trending_ttl_secs: env_var("TRENDING_CACHE_TTL_SECS")
                    .unwrap_or_else(|| default_trending_ttl().to_string())
                    .parse()
                    .context("TRENDING_CACHE_TTL_SECS must be an integer")?,
                view_history_cap: env_var("VIEW_HISTORY_CAP")
                    .unwrap_or_else(|| default_view_history_cap().to_string())
                    .parse()
                    .context("VIEW_HISTORY_CAP must be an integer")?,
                trending_candidate_days: env_var("TRENDING_CANDIDATE_DAYS")
                    .unwrap_or_else(|| default_trending_candidate_days().to_string())
                    .parse()
                    .context("TRENDING_CANDIDATE_DAYS must be an integer")?,
                cold_start_min_interactions: env_var("COLD_START_MIN_INTERACTIONS")
                    .unwrap_or_else(|| default_cold_start_interactions().to_string())
                    .parse()
                    .context("COLD_START_MIN_INTERACTIONS must be an integer")?,
                cold_start_min_account_days: env_var("COLD_START_MIN_ACCOUNT_DAYS")
                    .unwrap_or_else(|| default_cold_start_account_days().to_string())
                    .parse()
                    .context("COLD_START_MIN_ACCOUNT_DAYS must be an integer")?,
                preference_refresh_secs: env_var("PREFERENCE_REFRESH_SECS")
                    .unwrap_or_else(|| default_preference_refresh_secs().to_string())
                    .parse()
                    .context("PREFERENCE_REFRESH_SECS must be an integer")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_config_defaults() {
        let feed = FeedConfig::default();
        assert_eq!(feed.feed_ttl_secs, 300);
        assert_eq!(feed.trending_ttl_secs, 600);
        assert_eq!(feed.view_history_cap, 50);
        assert_eq!(feed.trending_candidate_days, 7);
        assert_eq!(feed.cold_start_min_interactions, 3);
        assert_eq!(feed.cold_start_min_account_days, 7);
    }
}
