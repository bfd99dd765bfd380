use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http_client::UpstreamFailure;

/// Network-level reason the weather provider could not be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCause {
    Timeout,
    Connect,
}

impl NetworkCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkCause::Timeout => "timeout",
            NetworkCause::Connect => "connect",
        }
    }
}

/// Every failure a weather lookup can end in, as seen by API clients
#[derive(Error, Debug, Clone)]
pub enum WeatherError {
    #[error("city name is empty")]
    InvalidInput,

    #[error("weather provider does not know the requested city")]
    CityNotFound { upstream_body: Option<Value> },

    #[error("weather provider rejected the configured API key")]
    UpstreamAuthFailure { upstream_body: Option<Value> },

    #[error("weather provider responded with HTTP {status}")]
    UpstreamError {
        status: u16,
        upstream_body: Option<Value>,
    },

    #[error("weather provider unreachable: {reason}")]
    ServiceUnavailable { cause: NetworkCause, reason: String },

    #[error("{origin} failure: {reason}")]
    InternalError {
        origin: &'static str,
        reason: String,
    },
}

impl WeatherError {
    pub fn internal(origin: &'static str, reason: impl Into<String>) -> Self {
        Self::InternalError {
            origin,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::InvalidInput => "InvalidInput",
            WeatherError::CityNotFound { .. } => "CityNotFound",
            WeatherError::UpstreamAuthFailure { .. } => "UpstreamAuthFailure",
            WeatherError::UpstreamError { .. } => "UpstreamError",
            WeatherError::ServiceUnavailable { .. } => "ServiceUnavailable",
            WeatherError::InternalError { .. } => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WeatherError::InvalidInput => StatusCode::BAD_REQUEST,
            WeatherError::CityNotFound { .. } => StatusCode::NOT_FOUND,
            WeatherError::UpstreamAuthFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            WeatherError::UpstreamError { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            WeatherError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WeatherError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for the `error` field of the response body.
    pub fn title(&self) -> &'static str {
        match self {
            WeatherError::InvalidInput => "City name is required",
            WeatherError::CityNotFound { .. } => "City not found",
            WeatherError::UpstreamAuthFailure { .. } => "API authentication failed",
            WeatherError::UpstreamError { .. } => "Weather service error",
            WeatherError::ServiceUnavailable { .. } => "Service unavailable",
            WeatherError::InternalError { .. } => "Internal server error",
        }
    }

    /// User-facing explanation; never includes provider or credential details.
    pub fn message(&self) -> &'static str {
        match self {
            WeatherError::InvalidInput => "Please provide a valid city name",
            WeatherError::CityNotFound { .. } => {
                "The city you searched for could not be found. Please check the spelling and try again."
            }
            WeatherError::UpstreamAuthFailure { .. } => {
                "There was an issue with the weather service. Please try again later."
            }
            WeatherError::UpstreamError { .. } => {
                "Unable to fetch weather data. Please try again later."
            }
            WeatherError::ServiceUnavailable { .. } => {
                "Unable to connect to weather service. Please check your internet connection."
            }
            WeatherError::InternalError { .. } => {
                "Something went wrong while fetching weather data."
            }
        }
    }

    fn details(&self) -> ErrorDetails {
        let mut details = ErrorDetails {
            kind: self.kind(),
            original_error: self.to_string(),
            status_code: None,
            api_response: None,
            network_error: None,
            error_type: None,
            timestamp: Utc::now(),
        };

        match self {
            WeatherError::InvalidInput => {}
            WeatherError::CityNotFound { upstream_body } => {
                details.status_code = Some(404);
                details.api_response = upstream_body.clone();
            }
            WeatherError::UpstreamAuthFailure { upstream_body } => {
                details.status_code = Some(401);
                details.api_response = upstream_body.clone();
            }
            WeatherError::UpstreamError {
                status,
                upstream_body,
            } => {
                details.status_code = Some(*status);
                details.api_response = upstream_body.clone();
            }
            WeatherError::ServiceUnavailable { cause, .. } => {
                details.network_error = Some(cause.as_str());
            }
            WeatherError::InternalError { origin, .. } => {
                details.error_type = Some(*origin);
            }
        }

        details
    }

    /// Attach the rendering mode; `verbose` adds diagnostic details to the body.
    pub fn into_api_error(self, verbose: bool) -> ApiError {
        ApiError {
            error: self,
            verbose,
        }
    }
}

impl From<UpstreamFailure> for WeatherError {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Status { status: 404, body } => Self::CityNotFound {
                upstream_body: body,
            },
            UpstreamFailure::Status { status: 401, body } => Self::UpstreamAuthFailure {
                upstream_body: body,
            },
            UpstreamFailure::Status { status, body } => Self::UpstreamError {
                status,
                upstream_body: body,
            },
            failure @ UpstreamFailure::Timeout(_) => Self::ServiceUnavailable {
                cause: NetworkCause::Timeout,
                reason: failure.to_string(),
            },
            UpstreamFailure::Connect(reason) => Self::ServiceUnavailable {
                cause: NetworkCause::Connect,
                reason,
            },
            UpstreamFailure::Decode(reason) => Self::internal("UpstreamPayload", reason),
            UpstreamFailure::Transport(reason) => Self::internal("UpstreamTransport", reason),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetails {
    kind: &'static str,
    original_error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<&'static str>,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<ErrorDetails>,
}

/// A [`WeatherError`] ready to be rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub error: WeatherError,
    pub verbose: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.error.title(),
            message: self.error.message(),
            details: self.verbose.then(|| self.error.details()),
        });

        (self.error.status_code(), body).into_response()
    }
}
