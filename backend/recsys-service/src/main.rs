use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use recsys_service::{handlers, AppState, Config, RecommendationService};
use std::sync::Arc;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting recsys-service v{}", env!("CARGO_PKG_VERSION"));

    config
        .validate()
        .context("Configuration validation failed")?;
    info!(data_dir = %config.data_dir, "Configuration loaded and validated");

    // Offline indices must be fully loaded before any traffic is accepted
    let service = match RecommendationService::from_config(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "Failed to load offline indices, refusing to serve");
            return Err(e.into());
        }
    };

    let state = web::Data::new(AppState::new(service, &config));

    info!("Starting HTTP server on {}:{}", config.http_host, config.http_port);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((config.http_host.as_str(), config.http_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")
}
