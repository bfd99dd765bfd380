use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{WeatherObservation, window_start};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{CachePolicy, CacheStore, StoreError, validate};

/// Store backed by a PostgreSQL table of observations.
pub struct PgCache {
    pool: PgPool,
    policy: CachePolicy,
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    id: Uuid,
    city: String,
    temperature: i64,
    condition: String,
    icon: String,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
    pressure: Option<f64>,
    visibility: Option<f64>,
    observed_at: DateTime<Utc>,
}

impl From<ObservationRow> for WeatherObservation {
    fn from(row: ObservationRow) -> Self {
        Self {
            id: row.id,
            city: row.city,
            temperature: row.temperature,
            condition: row.condition,
            icon: row.icon,
            humidity: row.humidity,
            wind_speed: row.wind_speed,
            pressure: row.pressure,
            visibility: row.visibility,
            timestamp: row.observed_at,
        }
    }
}

impl PgCache {
    pub async fn connect(database_url: &str, policy: CachePolicy) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, policy))
    }

    pub fn with_pool(pool: PgPool, policy: CachePolicy) -> Self {
        Self { pool, policy }
    }
}

/// Rows with `observed_at` after this are fresh at `now`.
fn fresh_after(policy: &CachePolicy, now: DateTime<Utc>) -> DateTime<Utc> {
    window_start(now, policy.freshness)
}

/// Rows with `observed_at` at or before this are past retention at `now`.
fn expired_through(policy: &CachePolicy, now: DateTime<Utc>) -> DateTime<Utc> {
    window_start(now, policy.retention)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running cache store migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_observations (
            id UUID PRIMARY KEY,
            city VARCHAR(255) NOT NULL CHECK (city <> ''),
            temperature BIGINT NOT NULL,
            condition TEXT NOT NULL,
            icon VARCHAR(32) NOT NULL,
            humidity DOUBLE PRECISION,
            wind_speed DOUBLE PRECISION,
            pressure DOUBLE PRECISION,
            visibility DOUBLE PRECISION,
            observed_at TIMESTAMP WITH TIME ZONE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS weather_observations_city_observed_at
            ON weather_observations (city, observed_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    info!("Cache store migrations completed successfully");
    Ok(())
}

#[async_trait]
impl CacheStore for PgCache {
    async fn lookup_fresh(
        &self,
        city: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WeatherObservation>, StoreError> {
        let row = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT id, city, temperature, condition, icon,
                   humidity, wind_speed, pressure, visibility, observed_at
            FROM weather_observations
            WHERE city = $1 AND observed_at > $2
            ORDER BY observed_at DESC
            LIMIT 1
            "#,
        )
        .bind(city)
        .bind(fresh_after(&self.policy, now))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(WeatherObservation::from))
    }

    async fn insert(&self, observation: WeatherObservation) -> Result<(), StoreError> {
        validate(&observation, Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO weather_observations
                (id, city, temperature, condition, icon,
                 humidity, wind_speed, pressure, visibility, observed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(observation.id)
        .bind(&observation.city)
        .bind(observation.temperature)
        .bind(&observation.condition)
        .bind(&observation.icon)
        .bind(observation.humidity)
        .bind(observation.wind_speed)
        .bind(observation.pressure)
        .bind(observation.visibility)
        .bind(observation.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM weather_observations WHERE observed_at <= $1")
            .bind(expired_through(&self.policy, now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
