//! coldspec HTTP server entry point.

mod auth;
mod cli;
mod error;
mod routes;
mod state;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::cli::Args;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_telemetry(&args)?;

    let config = match &args.config {
        Some(path) => coldspec_core::AppConfig::load_from_file(path)
            .context("Failed to load configuration file")?,
        None => coldspec_core::AppConfig::load().context("Failed to load configuration")?,
    };

    let host = args.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let state = AppState::build(config).await?;
    let app = routes::router(state);

    let addr = format!("{host}:{port}");
    info!(%addr, "coldspec server listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind HTTP listener")?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("HTTP server error")?;

    Ok(())
}
