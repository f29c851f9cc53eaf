// ABOUTME: Command-line entry point for the wearables aggregation layer
// ABOUTME: Runs a seeded demo, prints the WHOOP authorization URL, or serves vendor webhooks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pierre_wearables::config::WearablesConfig;
use pierre_wearables::constants::webhooks::DEFAULT_PORT;
use pierre_wearables::context::WearablesContext;
use pierre_wearables::drivers::health_store::InMemoryHealthStore;
use pierre_wearables::drivers::ConnectOptions;
use pierre_wearables::logging;
use pierre_wearables::models::{SyncConfig, VendorType};
use pierre_wearables::oauth2_client::{OAuthClient, OAuthClientConfig};
use pierre_wearables::routes;
use pierre_wearables::storage::InMemoryDeviceStore;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "pierre-wearables")]
#[command(about = "Multi-device wearable aggregation, recovery scoring and webhooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed an in-memory health store, sync it and print the unified snapshot
    Demo {
        /// Days of synthetic history
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Seed for the synthetic data
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Print the WHOOP authorization URL
    AuthorizeUrl {
        /// OAuth state parameter (random when omitted)
        #[arg(long)]
        state: Option<String>,
    },
    /// Serve the WHOOP webhook and health routes
    ServeWebhooks {
        /// Listen port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;
    let cli = Cli::parse();
    let config = WearablesConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Demo { days, seed } => run_demo(config, days, seed).await,
        Commands::AuthorizeUrl { state } => print_authorize_url(&config, state),
        Commands::ServeWebhooks { port } => serve_webhooks(config, port).await,
    }
}

async fn run_demo(config: WearablesConfig, days: i64, seed: u64) -> Result<()> {
    let store = InMemoryHealthStore::new().with_synthetic_history(Utc::now(), days, seed);
    let context = WearablesContext::builder(config)
        .health_store(Arc::new(store))
        .device_store(Arc::new(InMemoryDeviceStore::new()))
        .build()?;
    let manager = context.manager();

    let device = manager
        .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
        .await?;
    info!(device_id = %device.id, "Demo device added");

    for result in manager.sync_all_devices().await {
        info!(
            device_id = %result.device_id,
            success = result.success,
            items = result.items_synced,
            "Demo sync finished"
        );
    }

    let snapshot = manager.unified_metrics(true).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    manager.shutdown();
    Ok(())
}

fn print_authorize_url(config: &WearablesConfig, state: Option<String>) -> Result<()> {
    let client = OAuthClient::new(OAuthClientConfig::whoop(&config.whoop), config.http.build_client()?);
    let state = state.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let url = client.authorization_url(&state)?;

    println!("\nVisit this URL to authorize WHOOP access:");
    println!("{url}\n");
    println!("State: {state}");
    Ok(())
}

async fn serve_webhooks(config: WearablesConfig, port: u16) -> Result<()> {
    info!("{}", config.summary());
    let context = WearablesContext::builder(config).build()?;
    let manager = context.manager().clone();

    manager.restore_devices().await?;
    let auto_sync = manager.start_auto_sync();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Serving webhooks");

    axum::serve(listener, routes::router(&context))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Webhook server failed")?;

    auto_sync.stop().await;
    manager.shutdown();
    info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
    }
}
