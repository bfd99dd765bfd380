//! HTTP service answering "current weather for a city", with a short-lived
//! cache in front of the OpenWeatherMap API.

pub mod api_client;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod openapi;
pub mod service;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/weather/{city}", get(handlers::get_weather))
        .merge(openapi::swagger_ui())
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
