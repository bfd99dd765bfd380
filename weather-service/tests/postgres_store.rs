//! Runs against a real PostgreSQL instance:
//! `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::{TimeDelta, Utc};
use common::models::{CurrentConditions, WeatherObservation};
use uuid::Uuid;
use weather_service::cache::{CachePolicy, CacheStore, PgCache};

fn observation(city: &str, age: TimeDelta) -> WeatherObservation {
    WeatherObservation::new(
        city,
        CurrentConditions {
            temperature: 17.4,
            condition: "scattered clouds".to_string(),
            icon: "03d".to_string(),
            humidity: Some(55.0),
            wind_speed: Some(4.1),
            pressure: None,
            visibility: None,
        },
        Utc::now() - age,
    )
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_postgres_lookup_insert_purge() {
    let database_url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
    let store = PgCache::connect(&database_url, CachePolicy::default())
        .await
        .expect("Failed to connect");

    // Unique key so concurrent runs do not see each other's rows.
    let city = format!("testville-{}", Uuid::new_v4().simple());

    store
        .insert(observation(&city, TimeDelta::minutes(20)))
        .await
        .unwrap();
    assert!(store.lookup_fresh(&city, Utc::now()).await.unwrap().is_none());

    let recent = observation(&city, TimeDelta::minutes(1));
    store.insert(recent.clone()).await.unwrap();

    let found = store.lookup_fresh(&city, Utc::now()).await.unwrap().unwrap();
    assert_eq!(found.id, recent.id);
    assert_eq!(found.temperature, 17);
    assert_eq!(found.wind_speed, Some(4.1));

    let removed = store.purge_expired(Utc::now()).await.unwrap();
    assert!(removed >= 1);
    assert!(store.lookup_fresh(&city, Utc::now()).await.unwrap().is_some());
}
