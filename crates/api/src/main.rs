use std::sync::Arc;

use anyhow::Context;

use relay_api::app::{self, AppServices};
use relay_api::config::AppConfig;
use relay_api::users::UserStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    relay_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(AppServices::from_config(&config)?);

    let workers = if config.embedded_worker {
        services.start_workers(config.worker.clone())?
    } else {
        tracing::info!("embedded worker disabled; run relay-worker against the same broker");
        Vec::new()
    };

    let app = app::build_app(services, Arc::new(UserStore::seeded()));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tokio::task::spawn_blocking(move || {
        for handle in workers {
            handle.shutdown();
        }
    })
    .await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
