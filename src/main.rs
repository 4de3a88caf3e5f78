mod database;
mod error;
mod extract;
mod model_service;
mod ner;
mod routes;
mod schemas;
mod settings;
mod state;
mod translate;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, loaded_path) = Settings::discover()?;

    let default_filter = if settings.system_config.debug {
        "train_announce_api=debug,tower_http=debug"
    } else {
        "train_announce_api=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match &loaded_path {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("No configuration file found, using defaults"),
    }

    info!("Starting Train Announcement Translation API...");
    let app_state = AppState::new(&settings).await?;

    if !app_state.ner.is_ready().await {
        warn!("NER service not properly initialized");
    }
    if !app_state.translation.is_ready().await {
        warn!("Translation service not properly initialized");
    }
    if !app_state.database.is_connected() {
        warn!("Database service not connected");
    }

    let database = app_state.database.clone();
    let app = routes::build_app(app_state);

    let system_config = &settings.system_config;
    let addr = format!("{}:{}", system_config.host, system_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down Train Announcement Translation API...");
    database.close();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
