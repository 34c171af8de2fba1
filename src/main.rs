use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use deskspace::config::Config;
use deskspace::http::{self, AppState, JwtVerifier};
use deskspace::service::Service;
use deskspace::tenant::TenantManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    deskspace::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let tenants = Arc::new(TenantManager::open(config.data_dir.clone(), config.compact_threshold)?);
    let state = Arc::new(AppState {
        service: Service::new(tenants.clone(), config.hours),
        verifier: JwtVerifier::new(&config.jwt_secret),
    });

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("deskspace listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  companies: {}", tenants.len());
    info!("  hours: {:02}:00-{:02}:00", config.hours.open(), config.hours.close());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, let in-flight requests finish
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("deskspace stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
