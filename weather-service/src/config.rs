use std::env;
use std::fmt;
use std::time::Duration;

use crate::cache::CachePolicy;

/// Upstream credential; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub openweather_url: String,
    pub api_key: Option<ApiKey>,
    pub database_url: Option<String>,
    pub cache_ttl_seconds: u64,
    pub cache_retention_seconds: u64,
    pub cache_sweep_interval_seconds: u64,
    pub upstream_timeout_seconds: u64,
    pub single_flight: bool,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source; missing or unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            openweather_url: lookup("OPENWEATHER_URL").unwrap_or_else(|| {
                "https://api.openweathermap.org/data/2.5/weather".to_string()
            }),
            api_key: non_empty("OPENWEATHER_API_KEY").map(ApiKey::new),
            database_url: non_empty("DATABASE_URL"),
            cache_ttl_seconds: lookup("CACHE_TTL_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(600), // 10 minutes
            cache_retention_seconds: lookup("CACHE_RETENTION_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
            cache_sweep_interval_seconds: lookup("CACHE_SWEEP_INTERVAL_SECONDS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(60),
            upstream_timeout_seconds: lookup("UPSTREAM_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(5),
            single_flight: lookup("SINGLE_FLIGHT")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            environment: lookup("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Production),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::from_secs(self.cache_ttl_seconds, self.cache_retention_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_seconds)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}
