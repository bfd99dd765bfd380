use async_trait::async_trait;
use common::http_client::{HttpClient, UpstreamFailure};
use common::models::CurrentConditions;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::ApiKey;

/// Source of current weather readings for a normalized city name
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_weather(&self, city: &str) -> Result<CurrentConditions, UpstreamFailure>;
}

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    main: MainReadings,
    #[serde(default)]
    weather: Vec<ConditionEntry>,
    wind: Option<Wind>,
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

impl TryFrom<OpenWeatherResponse> for CurrentConditions {
    type Error = UpstreamFailure;

    fn try_from(response: OpenWeatherResponse) -> Result<Self, Self::Error> {
        let primary = response
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamFailure::Decode("response has no weather entries".to_string()))?;

        Ok(Self {
            temperature: response.main.temp,
            condition: primary.description,
            icon: primary.icon,
            humidity: response.main.humidity,
            wind_speed: response.wind.and_then(|w| w.speed),
            pressure: response.main.pressure,
            visibility: response.visibility,
        })
    }
}

/// Client for the OpenWeatherMap current-weather endpoint, in metric units
pub struct OpenWeatherClient {
    http_client: HttpClient,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl OpenWeatherClient {
    pub fn new(
        base_url: String,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: HttpClient::new(timeout)?,
            base_url,
            api_key,
        })
    }

    fn request_url(&self, city: &str) -> String {
        let mut url = format!(
            "{}?q={}&units=metric",
            self.base_url,
            urlencoding::encode(city)
        );
        if let Some(key) = &self.api_key {
            url.push_str("&appid=");
            url.push_str(&urlencoding::encode(key.expose()));
        }
        url
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self), fields(city = %city))]
    async fn current_weather(&self, city: &str) -> Result<CurrentConditions, UpstreamFailure> {
        info!(city = %city, base_url = %self.base_url, "Fetching weather from OpenWeather");

        let response: OpenWeatherResponse =
            self.http_client.get_json(&self.request_url(city)).await?;

        CurrentConditions::try_from(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(api_key: Option<&str>) -> OpenWeatherClient {
        OpenWeatherClient::new(
            "https://weather.example/data/2.5/weather".to_string(),
            api_key.map(ApiKey::new),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn url_encodes_city_and_key() {
        let url = client(Some("k&y")).request_url("são paulo");
        assert_eq!(
            url,
            "https://weather.example/data/2.5/weather?q=s%C3%A3o%20paulo&units=metric&appid=k%26y"
        );
    }

    #[test]
    fn url_without_key_has_no_appid() {
        let url = client(None).request_url("london");
        assert!(!url.contains("appid"));
    }

    #[test]
    fn parses_full_payload() {
        let response: OpenWeatherResponse = serde_json::from_value(json!({
            "main": { "temp": 21.6, "humidity": 40, "pressure": 1012 },
            "weather": [{ "description": "clear sky", "icon": "01d" }],
            "wind": { "speed": 3.6 },
            "visibility": 10000
        }))
        .unwrap();

        let conditions = CurrentConditions::try_from(response).unwrap();
        assert_eq!(conditions.temperature, 21.6);
        assert_eq!(conditions.condition, "clear sky");
        assert_eq!(conditions.icon, "01d");
        assert_eq!(conditions.humidity, Some(40.0));
        assert_eq!(conditions.wind_speed, Some(3.6));
        assert_eq!(conditions.pressure, Some(1012.0));
        assert_eq!(conditions.visibility, Some(10000.0));
    }

    #[test]
    fn optional_readings_may_be_absent() {
        let response: OpenWeatherResponse = serde_json::from_value(json!({
            "main": { "temp": 5.0 },
            "weather": [{ "description": "mist", "icon": "50n" }]
        }))
        .unwrap();

        let conditions = CurrentConditions::try_from(response).unwrap();
        assert_eq!(conditions.humidity, None);
        assert_eq!(conditions.wind_speed, None);
    }

    #[test]
    fn empty_weather_list_is_a_decode_failure() {
        let response: OpenWeatherResponse = serde_json::from_value(json!({
            "main": { "temp": 5.0 },
            "weather": []
        }))
        .unwrap();

        assert!(matches!(
            CurrentConditions::try_from(response),
            Err(UpstreamFailure::Decode(_))
        ));
    }
}
