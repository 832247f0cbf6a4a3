//! Relay binary entry point

use anyhow::Context;
use clap::Parser;
use rencontres_server::{ServerConfig, ServerState, serve};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_json);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let state = ServerState::new(config);
    let sweep = state.spawn_offer_expiry();
    if let Some(ttl) = state.config().offer_ttl_secs {
        info!(ttl_secs = ttl, "pending offers expire");
    }

    serve(listener, state, shutdown_signal()).await?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    Ok(())
}
