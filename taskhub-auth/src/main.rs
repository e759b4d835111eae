use service_core::observability::init_tracing;
use std::{net::SocketAddr, sync::Arc};
use taskhub_auth::{
    build_router,
    config::{EmailBackend, ServiceConfig, StorageBackend},
    db::{MongoDb, Stores},
    services::{metrics, EmailProvider, LogEmailService, SmtpEmailService, SystemClock},
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Fail fast on invalid configuration
    let config = ServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        storage = ?config.storage.backend,
        "Starting taskhub auth service"
    );

    let stores = match config.storage.backend {
        StorageBackend::Mongodb => {
            let db =
                MongoDb::connect(&config.storage.mongodb.uri, &config.storage.mongodb.database)
                    .await?;
            db.initialize_indexes().await?;
            tracing::info!("Database initialized successfully");
            Stores::mongo(db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory stores; data is lost on restart");
            Stores::in_memory()
        }
    };

    let email: Arc<dyn EmailProvider> = match config.email.backend {
        EmailBackend::Smtp => Arc::new(SmtpEmailService::new(&config.email)?),
        EmailBackend::Log => Arc::new(LogEmailService),
    };
    tracing::info!(backend = ?config.email.backend, "Email service initialized");

    let addr = config.common.socket_addr();
    let state = AppState::new(config.clone(), stores, email, Arc::new(SystemClock));
    let app = build_router(state);

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
