use tracing_subscriber::fmt::layer;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is unset. Connection pool and HTTP internals stay quiet.
pub const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,hyper=warn,reqwest=warn";

/// How log lines are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with the current span (city, route) attached
    Json,
    /// Human-readable lines with source locations
    Pretty,
}

impl LogFormat {
    pub fn for_environment(development: bool) -> Self {
        if development {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_tracing(format: LogFormat) -> Result<(), TryInitError> {
    let registry = Registry::default().with(env_filter());

    match format {
        LogFormat::Json => registry
            .with(layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
    }
}
