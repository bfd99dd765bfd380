use common::tracing::{LogFormat, init_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use weather_service::api_client::OpenWeatherClient;
use weather_service::cache::{self, CacheStore, MemoryCache, PgCache};
use weather_service::config::Config;
use weather_service::service::WeatherService;
use weather_service::{AppState, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_tracing(LogFormat::for_environment(config.environment.is_development()))?;

    let cancellation_token = CancellationToken::new();
    let policy = config.cache_policy();

    let store: Arc<dyn CacheStore> = match &config.database_url {
        Some(database_url) => {
            info!("Using PostgreSQL cache store");
            Arc::new(PgCache::connect(database_url, policy).await?)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory cache store");
            Arc::new(MemoryCache::new(policy))
        }
    };
    let sweeper = cache::spawn_expiry_sweeper(
        store.clone(),
        config.sweep_interval(),
        cancellation_token.clone(),
    );

    if config.api_key.is_none() {
        warn!("OPENWEATHER_API_KEY is not set, upstream requests will be rejected");
    }
    let provider = Arc::new(OpenWeatherClient::new(
        config.openweather_url.clone(),
        config.api_key.clone(),
        config.upstream_timeout(),
    )?);

    let mut service = WeatherService::new(store, provider);
    if config.single_flight {
        info!("Single-flight coalescing of cache misses enabled");
        service = service.with_single_flight();
    }

    let state = AppState {
        service: Arc::new(service),
        verbose_errors: config.environment.is_development(),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Weather service starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(stop_on_signal(cancellation_token))
        .await?;

    sweeper.await?;
    info!("In-flight requests drained, weather service stopped");
    Ok(())
}

/// Resolves with the name of the first stop signal received.
async fn stop_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Stop accepting connections once a signal arrives and cancel the expiry sweeper.
async fn stop_on_signal(sweeper_token: CancellationToken) {
    let received = stop_signal().await;
    info!(signal = received, "Stop requested, refusing new weather requests");

    sweeper_token.cancel();
    info!("Expiry sweeper cancelled, draining in-flight requests");
}
