use std::env;
use std::time::Duration;

use crate::services::recommendations::MAX_RECOMMENDATIONS;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    // Recommendation engine
    pub recommender_url: String,
    pub recommender_timeout_secs: u64,
    pub recommendation_limit: usize,
    pub popular_cache_ttl_secs: u64,
    // Object storage (display URLs only, uploads live elsewhere)
    pub storage_endpoint: String,
    pub storage_bucket: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|s| !s.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.into());

        let recommendation_limit: usize = or("RECOMMENDATION_LIMIT", "10").parse()?;
        anyhow::ensure!(
            (1..=MAX_RECOMMENDATIONS).contains(&recommendation_limit),
            "RECOMMENDATION_LIMIT must be in 1..={MAX_RECOMMENDATIONS}, got {recommendation_limit}"
        );

        Ok(Self {
            database_url: get("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("Missing required env var: DATABASE_URL"))?,
            redis_url: or("REDIS_URL", "redis://127.0.0.1:6379"),
            host: or("HOST", "0.0.0.0"),
            port: or("PORT", "8080").parse()?,
            app_base_url: or("APP_BASE_URL", "http://localhost"),
            recommender_url: or("RECOMMENDER_URL", "http://127.0.0.1:8087"),
            recommender_timeout_secs: or("RECOMMENDER_TIMEOUT_SECS", "5").parse()?,
            recommendation_limit,
            popular_cache_ttl_secs: or("POPULAR_CACHE_TTL_SECS", "300").parse()?,
            storage_endpoint: or("STORAGE_ENDPOINT", "http://localhost:9000"),
            storage_bucket: or("STORAGE_BUCKET", "activities"),
        })
    }

    pub fn recommender_timeout(&self) -> Duration {
        Duration::from_secs(self.recommender_timeout_secs)
    }

    pub fn popular_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.popular_cache_ttl_secs)
    }
}
