// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Seatscope Runtime Server
//!
//! HTTP API for the multi-tenant M365 license optimization service.

mod api;
mod config;
mod db;
mod error;
mod fingerprint;
mod handlers;
mod http;
mod orchestrator;
mod rate_limit;
mod state;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use http::HttpServer;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("starting seatscope runtime");

    let config = Config::load()?;
    let http_config = config.http.clone();

    let state = AppState::new(config).await?;

    HttpServer::new(http_config, state).start().await.map_err(|e| anyhow::anyhow!("HTTP server failed: {e}"))?;

    Ok(())
}
