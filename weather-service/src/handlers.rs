use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use common::errors::ApiError;
use common::models::{HealthResponse, WeatherResponse};
use std::sync::Arc;
use tracing::info;

use crate::service::WeatherService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
    /// Include diagnostic details in error bodies (development only).
    pub verbose_errors: bool,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health check", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

#[utoipa::path(
    get,
    path = "/api/weather/{city}",
    params(
        ("city" = String, Path, description = "City name, case and surrounding whitespace are ignored")
    ),
    responses(
        (status = 200, description = "Current weather for the city", body = WeatherResponse),
        (status = 400, description = "Empty city name"),
        (status = 404, description = "City not known to the weather provider"),
        (status = 500, description = "Internal or provider authentication error"),
        (status = 503, description = "Weather provider unreachable")
    ),
    tag = "weather"
)]
pub async fn get_weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<WeatherResponse>, ApiError> {
    info!(city = %city, "Weather request received");

    let weather = state
        .service
        .get_weather(&city, Utc::now())
        .await
        .map_err(|e| e.into_api_error(state.verbose_errors))?;

    Ok(Json(weather))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Route not found" })),
    )
}
