//! Relay pool simulator.
//!
//! Runs a connection pool against simulated relay connections that drop and
//! refuse handshakes at configurable rates, pushes messages through it, and
//! prints the final pool snapshot.
//!
//! # Architecture Overview
//!
//! ```text
//!     messages ──▶ ┌──────────────────────────────────────────────┐
//!                  │             ServiceConnectionContainer        │
//!                  │                                               │
//!                  │   router ──▶ slot 0 ──▶ simulated connection  │
//!                  │     │        slot 1 ──▶ simulated connection  │
//!                  │     │        ...                              │
//!                  │     └──────▶ slot N-1 ▶ simulated connection  │
//!                  │                                               │
//!                  │   supervisors: exit → backoff → replace       │
//!                  └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use relay_pool::config::{load_config, validate_config, ConfigError, RelayConfig};
use relay_pool::connection::simulated::{SimBehavior, SimulatedFactory};
use relay_pool::observability::{logging, metrics};
use relay_pool::{BackoffPolicy, ServiceConnectionContainer, ServiceEndpoint, ServiceMessage};

#[derive(Parser)]
#[command(name = "relay-sim")]
#[command(about = "Drive a relay connection pool with simulated connections", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of messages to send.
    #[arg(short, long, default_value_t = 100)]
    messages: usize,

    /// Distinct partition keys to cycle through (0 sends unkeyed messages).
    #[arg(short, long, default_value_t = 0)]
    keys: usize,

    /// Override the configured pool size.
    #[arg(long)]
    pool_size: Option<usize>,

    /// Pause between messages in milliseconds.
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(size) = cli.pool_size {
        config.pool.connection_count = size;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_tracing(&config.observability)?;
    tracing::info!(
        endpoint = %config.endpoint.name,
        url = %config.endpoint.url,
        connections = config.pool.connection_count,
        "relay-sim starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let endpoint = Arc::new(ServiceEndpoint::from_config(&config.endpoint));
    let (factory, mut deliveries) = SimulatedFactory::new(SimBehavior::from(&config.simulation));
    let container = ServiceConnectionContainer::builder(Arc::new(factory), endpoint.clone())
        .pool_config(&config.pool)
        .backoff(BackoffPolicy::from(&config.backoff))
        .build()?;

    let supervisor = tokio::spawn(container.clone().start());
    container.initialized().await;

    let drain = tokio::spawn(async move {
        let mut delivered = 0usize;
        while deliveries.recv().await.is_some() {
            delivered += 1;
        }
        delivered
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    let mut sent = 0usize;
    let mut failed = 0usize;
    for i in 0..cli.messages {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }

        let mut message = ServiceMessage::new(format!("message-{}", i));
        if cli.keys > 0 {
            message = message.with_partition_key(format!("key-{}", i % cli.keys));
        }
        match container.dispatch(&message).await {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::warn!(error = %e, message = i, "Write failed");
                failed += 1;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&container.snapshot())?);
    tracing::info!(
        sent,
        failed,
        endpoint_online = endpoint.is_online(),
        "Simulation finished"
    );

    container.shutdown();
    supervisor.await?;

    // Dropping the pool drops the factory and its connections, closing the channel.
    drop(container);
    let delivered = drain.await?;
    tracing::info!(delivered, "Deliveries drained");
    Ok(())
}
