use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::WeatherObservation;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CachePolicy, CacheStore, StoreError, validate};

/// Process-local store; observations are lost on restart.
pub struct MemoryCache {
    cache: Arc<RwLock<HashMap<String, Vec<WeatherObservation>>>>,
    policy: CachePolicy,
}

impl MemoryCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    /// Number of observations currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.cache.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn lookup_fresh(
        &self,
        city: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WeatherObservation>, StoreError> {
        let cache = self.cache.read().await;
        let freshest = cache
            .get(city)
            .into_iter()
            .flatten()
            .filter(|observation| observation.is_fresh(now, self.policy.freshness))
            .max_by_key(|observation| observation.timestamp)
            .cloned();
        Ok(freshest)
    }

    async fn insert(&self, observation: WeatherObservation) -> Result<(), StoreError> {
        validate(&observation, Utc::now())?;

        let retention = self.policy.retention;
        let written_at = observation.timestamp;
        let mut cache = self.cache.write().await;
        let entries = cache.entry(observation.city.clone()).or_default();
        entries.retain(|existing| existing.is_fresh(written_at, retention));
        entries.push(observation);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let retention = self.policy.retention;
        let mut cache = self.cache.write().await;
        let mut removed = 0;

        cache.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|observation| observation.is_fresh(now, retention));
            removed += (before - entries.len()) as u64;
            !entries.is_empty()
        });

        Ok(removed)
    }
}
