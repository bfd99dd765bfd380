//! Cache Store: persistence of recent weather observations keyed by city.
//!
//! Backends only ever append observations; freshness is decided at read time
//! and old records are removed by [`CacheStore::purge_expired`], usually from
//! the background task started by [`spawn_expiry_sweeper`].

mod memory;
mod postgres;

pub use memory::MemoryCache;
pub use postgres::PgCache;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::models::WeatherObservation;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid weather observation: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// How long observations are served and how long they are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub freshness: TimeDelta,
    pub retention: TimeDelta,
}

impl CachePolicy {
    pub fn from_secs(freshness_secs: u64, retention_secs: u64) -> Self {
        Self {
            freshness: delta_from_secs(freshness_secs),
            retention: delta_from_secs(retention_secs),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_secs(600, 600)
    }
}

fn delta_from_secs(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Most recent observation for `city` that is still fresh at `now`.
    async fn lookup_fresh(
        &self,
        city: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WeatherObservation>, StoreError>;

    /// Persist a new observation. Existing observations are never modified.
    async fn insert(&self, observation: WeatherObservation) -> Result<(), StoreError>;

    /// Remove observations older than the retention window, returning how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Reject observations that are missing a required field or are dated in the future.
pub fn validate(observation: &WeatherObservation, now: DateTime<Utc>) -> Result<(), StoreError> {
    let city = &observation.city;
    if city.trim().is_empty() {
        return Err(StoreError::Validation("city is required".to_string()));
    }
    if city.trim() != city || city.to_lowercase() != *city {
        return Err(StoreError::Validation(format!(
            "city `{city}` is not normalized"
        )));
    }
    if observation.condition.is_empty() {
        return Err(StoreError::Validation("condition is required".to_string()));
    }
    if observation.icon.is_empty() {
        return Err(StoreError::Validation("icon is required".to_string()));
    }
    if observation.timestamp > now {
        return Err(StoreError::Validation(format!(
            "timestamp {} is in the future",
            observation.timestamp
        )));
    }
    Ok(())
}

/// Periodically purge expired observations until `cancellation_token` fires.
pub fn spawn_expiry_sweeper(
    store: Arc<dyn CacheStore>,
    interval: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.purge_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "Purged expired weather observations"),
                        Err(e) => warn!(error = %e, "Failed to purge expired weather observations"),
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Expiry sweeper stopped");
                    break;
                }
            }
        }
    })
}
