//! Cache Shield
//!
//! An HTTP API over a document datastore with a Redis read-through cache,
//! response caching, and health monitoring, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                      CACHE SHIELD                         │
//!                              │                                                           │
//!     Client Request           │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐      │
//!     ─────────────────────────┼─▶│   http   │──▶│ response     │──▶│  services    │      │
//!                              │  │  server  │   │ cache + inval│   │ files, paths │      │
//!                              │  └──────────┘   └──────┬───────┘   └──────┬───────┘      │
//!                              │                        │                  │              │
//!                              │                        ▼                  ▼              │
//!                              │                 ┌──────────────┐   ┌──────────────┐      │
//!                              │                 │ cache client │   │    store     │      │
//!                              │                 │ + breaker    │   │ (datastore)  │      │
//!                              │                 └──────┬───────┘   └──────────────┘      │
//!                              │                        │                                 │
//!                              │                        ▼                                 │
//!                              │                 ┌──────────────┐                         │
//!                              │                 │ Redis/memory │                         │
//!                              │                 └──────────────┘                         │
//!                              │                                                           │
//!                              │  ┌────────────────────────────────────────────────────┐  │
//!                              │  │              Cross-Cutting Concerns                 │  │
//!                              │  │  config · health checks · observability · admin    │  │
//!                              │  │  resilience (timeouts, circuit breakers)           │  │
//!                              │  │  lifecycle (startup, signals, shutdown)            │  │
//!                              │  └────────────────────────────────────────────────────┘  │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use cache_shield::config::{load_config, load_from_env};
use cache_shield::lifecycle::{self, shutdown_signal, Shutdown};
use cache_shield::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "cache-shield")]
#[command(about = "File and path API with read-through caching and health monitoring", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cache-shield starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        redis_enabled = config.redis.enabled,
        http_cache_enabled = config.http_cache.enabled,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    lifecycle::run(config, shutdown).await?;
    Ok(())
}
