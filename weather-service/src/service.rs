use chrono::{DateTime, Utc};
use common::errors::WeatherError;
use common::models::{WeatherObservation, WeatherResponse};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument, warn};
use uniflight::UniFlight;

use crate::api_client::WeatherProvider;
use crate::cache::CacheStore;

/// Trim and lowercase a user-supplied city name into a cache key.
pub fn normalize_city(input: &str) -> Result<String, WeatherError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::InvalidInput);
    }
    Ok(trimmed.to_lowercase())
}

type Outcome = Result<WeatherResponse, WeatherError>;

/// Cache-then-fetch orchestration for current weather lookups
pub struct WeatherService {
    store: Arc<dyn CacheStore>,
    provider: Arc<dyn WeatherProvider>,
    in_flight: Option<UniFlight<String, Outcome>>,
}

impl WeatherService {
    pub fn new(store: Arc<dyn CacheStore>, provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            store,
            provider,
            in_flight: None,
        }
    }

    /// Coalesce concurrent cache misses for the same city into one upstream call.
    ///
    /// Callers that join an in-flight fetch share its outcome, failures included.
    pub fn with_single_flight(mut self) -> Self {
        self.in_flight = Some(UniFlight::new());
        self
    }

    #[instrument(skip(self, now), fields(city = %city_input))]
    pub async fn get_weather(&self, city_input: &str, now: DateTime<Utc>) -> Outcome {
        let city = normalize_city(city_input)?;

        if let Some(cached) = self.lookup(&city, now).await? {
            return Ok(cached);
        }

        match &self.in_flight {
            Some(group) => self.coalesced(group, &city, now).await,
            None => self.fetch_and_store(&city, now).await,
        }
    }

    async fn coalesced(
        &self,
        group: &UniFlight<String, Outcome>,
        city: &str,
        now: DateTime<Utc>,
    ) -> Outcome {
        // Only the leader's closure runs; followers get its outcome.
        let led = AtomicBool::new(false);
        let led_ref = &led;
        let outcome = group
            .work(city.to_string(), move || {
                led_ref.store(true, Ordering::Relaxed);
                async move {
                    // An earlier leader may have filled the cache since our miss.
                    match self.lookup(city, now).await {
                        Ok(Some(cached)) => Ok(cached),
                        Ok(None) => self.fetch_and_store(city, now).await,
                        Err(e) => Err(e),
                    }
                }
            })
            .await;

        if led.load(Ordering::Relaxed) {
            return outcome;
        }
        debug!(city = %city, "Joined in-flight fetch");
        outcome.map(|response| WeatherResponse {
            cached: true,
            ..response
        })
    }

    async fn lookup(
        &self,
        city: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WeatherResponse>, WeatherError> {
        match self.store.lookup_fresh(city, now).await {
            Ok(Some(observation)) => {
                info!(city = %city, observed_at = %observation.timestamp, "Cache hit");
                Ok(Some(observation.into_response(true)))
            }
            Ok(None) => {
                info!(city = %city, "Cache miss");
                Ok(None)
            }
            Err(e) => {
                error!(city = %city, error = %e, "Cache lookup failed");
                Err(WeatherError::internal("CacheLookup", e.to_string()))
            }
        }
    }

    async fn fetch_and_store(
        &self,
        city: &str,
        now: DateTime<Utc>,
    ) -> Result<WeatherResponse, WeatherError> {
        let conditions = self.provider.current_weather(city).await.map_err(|failure| {
            let err = WeatherError::from(failure);
            warn!(city = %city, kind = err.kind(), error = %err, "Upstream weather fetch failed");
            err
        })?;

        let observation = WeatherObservation::new(city, conditions, now);

        if let Err(e) = self.store.insert(observation.clone()).await {
            warn!(
                city = %city,
                error = %e,
                "Failed to persist weather observation, serving uncached result"
            );
        }

        Ok(observation.into_response(false))
    }
}
