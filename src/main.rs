// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Ricochet - A programmable HTTP echo server for API integration testing.
//!
//! Callers encode the desired response (status, delay, headers, body, and
//! conditional selection rules) inside the request's `_echo_response`
//! parameter or in referenced response files; the server parses that spec
//! and emits whatever it describes.

mod application;
mod domain;
mod infrastructure;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use application::counters::MatchCounters;
use infrastructure::logging::init_logging;
use infrastructure::server::{AppState, router};
use infrastructure::store::DiskResponseStore;

/// Command-line options.
#[derive(Parser)]
#[command(name = "ricochet")]
#[command(about = "Programmable HTTP echo server for API integration testing")]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1", env = "ECHO_HOST")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5000, env = "ECHO_PORT")]
    port: u16,

    /// Directory holding response files referenced by `file:` locations.
    #[arg(long, default_value = "responses", env = "ECHO_RESPONSES_DIR")]
    responses_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging before anything else
    init_logging();

    let cli = Cli::parse();

    let state = AppState {
        counters: Arc::new(MatchCounters::new()),
        store: Arc::new(DiskResponseStore::new(cli.responses_dir.clone())),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("bind {}:{}", cli.host, cli.port))?;
    tracing::info!(
        addr = %listener.local_addr().context("local_addr")?,
        responses_dir = %cli.responses_dir.display(),
        "echo server listening"
    );

    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
