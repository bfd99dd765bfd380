use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One successful reading from the upstream provider, before it is keyed and timestamped.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub condition: String,
    pub icon: String,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub visibility: Option<f64>,
}

/// A stored weather observation for a single city.
///
/// Observations are never updated; refreshing a city writes a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub id: Uuid,
    pub city: String,
    pub temperature: i64,
    pub condition: String,
    pub icon: String,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub visibility: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl WeatherObservation {
    /// Builds a new observation of `conditions` for an already normalized `city`.
    ///
    /// The timestamp is cut to millisecond precision so it reads back unchanged from
    /// every store and from its own JSON rendering.
    pub fn new(city: impl Into<String>, conditions: CurrentConditions, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            city: city.into(),
            temperature: round_temperature(conditions.temperature),
            condition: conditions.condition,
            icon: conditions.icon,
            humidity: conditions.humidity,
            wind_speed: conditions.wind_speed,
            pressure: conditions.pressure,
            visibility: conditions.visibility,
            timestamp: timestamp.trunc_subsecs(3),
        }
    }

    /// True while `now` is strictly less than `window` past the observation time.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.timestamp > window_start(now, window)
    }

    pub fn into_response(self, cached: bool) -> WeatherResponse {
        WeatherResponse {
            city: self.city,
            temperature: self.temperature,
            condition: self.condition,
            icon: self.icon,
            humidity: self.humidity,
            wind_speed: self.wind_speed,
            pressure: self.pressure,
            visibility: self.visibility,
            timestamp: self.timestamp,
            cached,
        }
    }
}

/// Oldest instant excluded from a window of length `window` ending at `now`.
///
/// An observation is inside the window iff its timestamp is strictly after this
/// point. Saturates at the earliest representable time for oversized windows.
pub fn window_start(now: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Nearest integer, ties toward positive infinity (-2.5 becomes -2, 2.5 becomes 3).
fn round_temperature(celsius: f64) -> i64 {
    let nearest = celsius.round();
    // `round` breaks ties away from zero; only negative ties need moving up.
    if celsius - nearest == 0.5 {
        (nearest + 1.0) as i64
    } else {
        nearest as i64
    }
}

/// Current weather for a city as returned to API clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResponse {
    pub city: String,
    pub temperature: i64,
    pub condition: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
}

/// Liveness payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
            message: "Weather API is running".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn conditions(temperature: f64) -> CurrentConditions {
        CurrentConditions {
            temperature,
            condition: "clear sky".to_string(),
            icon: "01d".to_string(),
            humidity: None,
            wind_speed: None,
            pressure: None,
            visibility: None,
        }
    }

    #[test]
    fn temperature_is_rounded_half_up() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(WeatherObservation::new("london", conditions(21.6), at).temperature, 22);
        assert_eq!(WeatherObservation::new("london", conditions(21.4), at).temperature, 21);
        assert_eq!(WeatherObservation::new("oslo", conditions(-2.5), at).temperature, -2);
        assert_eq!(WeatherObservation::new("oslo", conditions(-2.6), at).temperature, -3);
        assert_eq!(WeatherObservation::new("oslo", conditions(2.5), at).temperature, 3);
        assert_eq!(WeatherObservation::new("oslo", conditions(-0.5), at).temperature, 0);
    }

    #[test]
    fn value_just_below_one_half_rounds_down() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let just_below = 0.49999999999999994_f64;

        assert_eq!(WeatherObservation::new("quito", conditions(just_below), at).temperature, 0);
        assert_eq!(WeatherObservation::new("quito", conditions(-just_below), at).temperature, 0);
    }

    #[test]
    fn timestamp_is_kept_to_the_millisecond() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + TimeDelta::nanoseconds(123_456_789);
        let observation = WeatherObservation::new("lima", conditions(18.0), at);

        assert_eq!(observation.timestamp.timestamp_subsec_nanos(), 123_000_000);
        // Postgres keeps microseconds; nothing is lost on the way in.
        assert_eq!(observation.timestamp.trunc_subsecs(6), observation.timestamp);

        let json = serde_json::to_string(&observation.clone().into_response(false)).unwrap();
        let parsed: WeatherResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timestamp, observation.timestamp);
    }

    #[test]
    fn window_start_marks_the_exclusive_edge() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 10, 0).unwrap();
        let window = TimeDelta::minutes(10);
        let edge = window_start(now, window);

        assert_eq!(edge, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());

        let aged_599 = WeatherObservation::new("paris", conditions(10.0), now - TimeDelta::seconds(599));
        let aged_600 = WeatherObservation::new("paris", conditions(10.0), now - TimeDelta::seconds(600));
        assert!(aged_599.timestamp > edge);
        assert!(aged_599.is_fresh(now, window));
        assert!(aged_600.timestamp <= edge);
        assert!(!aged_600.is_fresh(now, window));
    }

    #[test]
    fn window_start_saturates_for_huge_windows() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(window_start(now, TimeDelta::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let observation = WeatherObservation::new("paris", conditions(10.0), at);
        let window = TimeDelta::minutes(10);

        assert!(observation.is_fresh(at, window));
        assert!(observation.is_fresh(at + TimeDelta::seconds(599), window));
        assert!(!observation.is_fresh(at + TimeDelta::seconds(600), window));
    }

    #[test]
    fn response_omits_unknown_readings() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let response = WeatherObservation::new("london", conditions(21.6), at).into_response(false);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["city"], "london");
        assert_eq!(json["temperature"], 22);
        assert_eq!(json["cached"], false);
        assert_eq!(json["timestamp"], "2024-01-01T12:00:00Z");
        assert!(json.get("windSpeed").is_none());
        assert!(json.get("humidity").is_none());
    }
}
