//! Customer-Service Assistant Server Entry Point

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use helpdesk_config::{load_registry, load_settings, may_fall_back_to_defaults, Settings};
use helpdesk_llm::{CompletionConfig, FlowiseBackend};
use helpdesk_persistence::PersistenceLayer;
use helpdesk_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("HELPDESK_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) if may_fall_back_to_defaults(env.as_deref(), &e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
        Err(e) => {
            eprintln!("Error: Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    init_tracing(&config);

    tracing::info!("Starting helpdesk server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled && init_metrics().is_some() {
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    // The registry is immutable for the life of the process
    let registry = match load_registry(&config) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load company registry");
            return Err(e.into());
        }
    };
    tracing::info!(
        companies = registry.len(),
        default = %registry.default_profile().id,
        "Company registry ready"
    );

    let completion = Arc::new(FlowiseBackend::new(CompletionConfig::from(&config.flowise))?);
    tracing::info!(endpoint = %config.flowise.endpoint, "Completion backend configured");

    let persistence = match helpdesk_persistence::init(&config.sheets) {
        Ok(layer) => layer,
        Err(e) => {
            tracing::error!(
                "Failed to initialize Google Sheets: {}. Falling back to in-memory.",
                e
            );
            PersistenceLayer::in_memory()
        }
    };
    tracing::info!(
        archive = persistence.conversations.backend(),
        feedback = persistence.feedback.backend(),
        "Initialized persistence"
    );

    let state = AppState::new(config.clone(), registry, completion, persistence).with_env(env);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Graceful shutdown on SIGTERM/SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("helpdesk={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
