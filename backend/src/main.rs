use std::net::SocketAddr;

use tokio::signal;

use scan_orchestrator::{config, create_router, middleware, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first
    let settings = config::Settings::new()?;

    middleware::init_logging(&settings.log_level, &settings.log_format)?;

    tracing::info!("Starting scan orchestrator v{}", env!("CARGO_PKG_VERSION"));

    let app_state = AppState::new(settings.clone()).await?;
    let scan_service = app_state.scan_service.clone();

    let app = create_router(app_state)
        .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
        .layer(middleware::create_trace_layer())
        .layer(middleware::create_cors_layer(&settings.cors_allow_origins));

    let addr: SocketAddr = settings.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scan_service.shutdown().await {
        tracing::error!(error = %e, "failed to flush state during shutdown");
        return Err(e.into());
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
