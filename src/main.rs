//! ==============================================================================
//! main.rs - ppm logger entry point
//! ==============================================================================
//!
//! purpose:
//!     receives periodic PPM gas readings over http, appends them to rotating
//!     flat files and serves the stored series back to a browser chart.
//!
//! responsibilities:
//!     - load configuration (config/ppm.toml, PORT env)
//!     - initialise tracing
//!     - build the segment writer (optionally resuming from the segments on disk)
//!     - serve the http api and dashboard until ctrl-c
//!
//! relationships:
//!     - uses: config.rs (settings)
//!     - uses: writer.rs (ingest & rotation)
//!     - uses: web.rs (routes; calls writer.rs and reader.rs)
//!
//! architecture:
//!
//!     ┌──────────┐  POST /api/ppm   ┌───────────┐  append   ┌──────────────────┐
//!     │  sensor  │ ───────────────> │  writer   │ ────────> │ measurements_0   │
//!     └──────────┘                  └───────────┘           │ measurements_1   │
//!                                                            │ ...              │
//!     ┌──────────┐  GET /data       ┌───────────┐  scan     │ measurements_N   │
//!     │  chart   │ <─────────────── │  reader   │ <──────── └──────────────────┘
//!     └──────────┘                  └───────────┘
//!
//! ==============================================================================

mod config;
mod domain;
mod error;
mod reader;
mod segment;
mod web;
mod writer;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::writer::SegmentWriter;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  PPM Logger");
    println!("  readings in, rotating segments out");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::AppConfig::load_or_default();
    config.print_summary();

    // step 2: logging (RUST_LOG wins over the config level)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // step 3: storage
    let storage = &config.storage;
    std::fs::create_dir_all(&storage.data_dir)
        .with_context(|| format!("failed to create data dir {}", storage.data_dir.display()))?;

    let writer = SegmentWriter::from_config(storage).context("failed to scan existing segments")?;
    let (segment, lines) = writer.position();
    tracing::info!(segment, lines, resume = storage.resume_on_start, "segment writer ready");

    // step 4: web server
    let app = web::router(web::AppState::new(writer, config.logging.show_readings));
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
