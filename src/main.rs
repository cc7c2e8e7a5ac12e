use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use openai_proxy_gateway::{
    app,
    config::{Args, Config},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();
    let port = args.port;
    let config = Config::from(args);

    let state = Arc::new(AppState::new(&config)?);
    let router = app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "gateway listening");
    tracing::info!(upstream = %config.upstream_url, "forwarding completions");
    tracing::info!(
        limit = config.rate_limit,
        window_secs = config.rate_window.as_secs(),
        store = ?config.store,
        identity = ?config.identity,
        "rate limit configured"
    );

    axum::serve(listener, router).await?;
    Ok(())
}
