//! # Event Webhook Main Entry Point
//!
//! This is the main entry point for the event webhook service.

use std::sync::Arc;

use anyhow::Context;
use event_webhook::{
    config::ConfigLoader,
    dynamo::init_client,
    ingest::EventIngestor,
    repositories::{DynamoTableClient, EventRepository},
    server::{AppState, run_server, shutdown_signal},
    telemetry::init_tracing,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Warning: a rustls crypto provider was already installed");
    }

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;

    init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(configuration = %redacted_json, "Effective configuration");
    }

    let client = init_client(&config)
        .await
        .context("failed to build DynamoDB client")?;
    let table = config.table_name()?.to_string();
    let repository = EventRepository::new(Arc::new(DynamoTableClient::new(client)), table)
        .await
        .context("failed to prepare events table")?;

    let state = AppState {
        config: Arc::new(config),
        ingestor: EventIngestor::new(Arc::new(repository)),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    run_server(state, shutdown).await?;
    Ok(())
}
