//! Configuration types for the payment orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Orchestrator identity and serving settings.
	pub orchestrator: OrchestratorSettings,
	/// Persistence backend selection.
	pub storage: StorageConfig,
	/// Provider registrations, keyed by provider id.
	#[serde(default)]
	pub providers: HashMap<String, ProviderConfig>,
}

/// Orchestrator identity and serving settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorSettings {
	/// Service name for logging.
	pub name: String,
	/// Public base URL used to derive provider callback URLs.
	pub base_url: String,
	/// Port for the HTTP API.
	pub http_port: u16,
	/// Log level filter.
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Currency allow-list enforced at the API edge.
	pub allowed_currencies: Vec<String>,
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Backend name: "memory" or "file".
	pub backend: String,
	/// Backend-specific settings, passed through to the factory.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

/// One provider registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
	/// Implementation type: "mock" or "rest".
	#[serde(rename = "type")]
	pub provider_type: String,
	/// Whether this provider is the registry default.
	#[serde(default)]
	pub default: bool,
	/// Implementation-specific settings, passed through to the factory.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			config: empty_table(),
		}
	}
}
