use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use common::models::{HealthResponse, WeatherResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::get_weather,
    ),
    components(schemas(
        WeatherResponse,
        HealthResponse,
    )),
    tags(
        (name = "weather", description = "Cached current weather by city"),
        (name = "health", description = "Liveness"),
    ),
)]
struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
