//! Factories that build concrete storage and provider implementations
//! from configuration.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use payment_config::{Config, ProviderConfig, StorageConfig};
use payment_provider::{MockProvider, PaymentProvider, ProviderRegistry, RestProvider};
use payment_storage::{FileStorage, MemoryStorage, StorageInterface};
use payment_types::PaymentStatus;

/// Creates the storage backend selected by the configuration.
pub fn create_storage(config: &StorageConfig) -> Result<Box<dyn StorageInterface>> {
	match config.backend.as_str() {
		"memory" => Ok(Box::new(MemoryStorage::new())),
		"file" => {
			let path = config
				.config
				.get("path")
				.and_then(|v| v.as_str())
				.unwrap_or("./data/payments");
			Ok(Box::new(FileStorage::new(PathBuf::from(path))))
		}
		other => bail!("Unknown storage backend '{}'", other),
	}
}

/// Builds the provider registry from the configured registrations.
pub fn create_registry(config: &Config) -> Result<ProviderRegistry> {
	let mut registry = ProviderRegistry::new();

	for (id, provider_config) in &config.providers {
		let provider = create_provider(id, provider_config)
			.with_context(|| format!("Failed to build provider '{}'", id))?;
		registry.register(provider, provider_config.default);
	}

	Ok(registry)
}

fn create_provider(id: &str, config: &ProviderConfig) -> Result<Arc<dyn PaymentProvider>> {
	match config.provider_type.as_str() {
		"mock" => {
			let mut provider = MockProvider::new(id);
			if let Some(currencies) = string_list(&config.config, "currencies") {
				let refs: Vec<&str> = currencies.iter().map(String::as_str).collect();
				provider = provider.with_currencies(&refs);
			}
			Ok(Arc::new(provider))
		}
		"rest" => {
			let base_url = required_str(&config.config, "base_url")?;
			let api_key = required_str(&config.config, "api_key")?;
			let currencies = string_list(&config.config, "currencies")
				.context("rest provider requires a 'currencies' list")?;
			let status_map = status_map(&config.config)?;

			Ok(Arc::new(RestProvider::new(
				id, base_url, api_key, currencies, status_map,
			)?))
		}
		other => bail!("Unknown provider type '{}'", other),
	}
}

fn required_str(config: &toml::Value, key: &str) -> Result<String> {
	config
		.get(key)
		.and_then(|v| v.as_str())
		.map(str::to_string)
		.with_context(|| format!("Missing required config key '{}'", key))
}

fn string_list(config: &toml::Value, key: &str) -> Option<Vec<String>> {
	config.get(key).and_then(|v| v.as_array()).map(|items| {
		items
			.iter()
			.filter_map(|v| v.as_str().map(str::to_string))
			.collect()
	})
}

/// Parses the `status_map` table mapping gateway status strings to
/// internal statuses.
fn status_map(config: &toml::Value) -> Result<HashMap<String, PaymentStatus>> {
	let table = config
		.get("status_map")
		.and_then(|v| v.as_table())
		.context("rest provider requires a 'status_map' table")?;

	let mut map = HashMap::new();
	for (gateway_status, internal) in table {
		let name = internal
			.as_str()
			.with_context(|| format!("status_map entry '{}' must be a string", gateway_status))?;
		let status: PaymentStatus =
			serde_json::from_value(serde_json::Value::String(name.to_string()))
				.with_context(|| format!("Unknown internal status '{}'", name))?;
		map.insert(gateway_status.clone(), status);
	}

	Ok(map)
}
