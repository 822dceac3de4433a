use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http_interface;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "moodlensd starting");

    let config = config::Config::from_env()?;
    let cascade_path = config.cascade_path();
    let model_path = config.emotion_model_path();
    tracing::info!(
        cascade = %cascade_path,
        model = %model_path,
        intra_threads = config.intra_threads,
        "configuration loaded"
    );

    // Missing artifacts are logged; the daemon still serves /health.
    let locator = engine::load_locator(&cascade_path);
    let model = engine::load_model(&model_path, config.intra_threads);
    let engine = engine::spawn_engine(locator, model);

    let app = http_interface::router(engine, config.max_upload_bytes);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "moodlensd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("moodlensd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
