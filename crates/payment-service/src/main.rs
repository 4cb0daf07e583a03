use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use payment_config::ConfigLoader;
use payment_core::PaymentOrchestrator;
use payment_storage::StorageService;

mod api;
mod implementations;

#[derive(Parser)]
#[command(name = "payment-service")]
#[command(about = "Payment lifecycle orchestrator", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "PAYMENT_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the payment service
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting payment service");
	info!("Loading configuration from: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration loaded successfully");
	info!("Service name: {}", config.orchestrator.name);
	info!("HTTP port: {}", config.orchestrator.http_port);

	let storage_backend = implementations::create_storage(&config.storage)
		.context("Failed to build storage backend")?;
	let storage = Arc::new(StorageService::new(storage_backend));

	let registry = implementations::create_registry(&config)
		.context("Failed to build provider registry")?;

	let orchestrator = Arc::new(PaymentOrchestrator::new(
		Arc::new(registry),
		storage,
		config.orchestrator.base_url.clone(),
	));

	let state = api::AppState {
		orchestrator,
		allowed_currencies: Arc::new(
			config
				.orchestrator
				.allowed_currencies
				.iter()
				.cloned()
				.collect::<HashSet<_>>(),
		),
	};

	info!("Payment service started successfully");

	api::serve(state, config.orchestrator.http_port, shutdown_signal()).await?;

	info!("Payment service stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Configuration is invalid")?;

	// Factories catch type-level mistakes validation alone cannot see.
	implementations::create_storage(&config.storage)?;
	implementations::create_registry(&config)?;

	info!("Configuration is valid");
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(log_level));

	tracing_subscriber::fmt().with_env_filter(filter).init();
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
	}
	info!("Shutdown signal received");
}
