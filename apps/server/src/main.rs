use anyhow::Context;
use fieldops_server::api::app_router;
use fieldops_server::config::Config;
use fieldops_server::main_lib::build_state;
use tracing::info;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> anyhow::Result<()> {
    // Forward `log` records from the library crates.
    LogTracer::init().context("installing log bridge")?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing subscriber")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = Config::from_env();
    let state = build_state(&config).context("preparing database")?;
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("fieldops-server listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;
    Ok(())
}
