use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use bakery_ledger as app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = app::config::load_config()?;
    app::config::init_tracing(cfg.log_level(), cfg.log_json);

    let repository = app::build_repository(&cfg).await.map_err(|e| {
        error!("Failed to open the {:?} store: {}", cfg.storage_backend, e);
        e
    })?;
    info!(backend = repository.backend_name(), "store ready");

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let router = app::build_router(app::AppState::new(repository, cfg));

    info!("bakery-ledger listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
    info!("shutdown signal received");
}
