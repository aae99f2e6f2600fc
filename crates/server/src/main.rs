use anyhow::Context;
use server::{AppState, config::ServerConfig, routes};
use services::services::hook::DataAccess;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is the normal case
    let _ = dotenvy::dotenv();
    utils::logging::init();

    let config = ServerConfig::from_env()?;
    let store = config.build_store().await?;
    info!(
        store = %config.store,
        path = %config.data_path.display(),
        "Using document store"
    );

    let access = DataAccess::open(store, config.repository());
    // the server stays up on a failed load so clients can see the error and retry
    if let Err(e) = access.wait_loaded().await {
        warn!(error = %e, "Document not loaded, serving the error until a reload succeeds");
    }

    let app = routes::router(AppState::new(access));
    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
