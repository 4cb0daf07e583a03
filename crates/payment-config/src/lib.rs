//! Configuration loading for the payment orchestrator.
//!
//! TOML files with `${VAR}` environment substitution, `PAYMENT_`-prefixed
//! environment overrides, and a validation pass before the config reaches
//! the rest of the system.

use std::env;
use std::path::Path;
use thiserror::Error;

pub mod types;

pub use types::{Config, OrchestratorSettings, ProviderConfig, StorageConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "PAYMENT_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let mut config = if let Some(file_path) = &self.file_path {
			self.load_from_file(file_path).await?
		} else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<Config, ConfigError> {
		let content = match tokio::fs::read_to_string(file_path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(file_path.to_string()))
			}
			Err(e) => return Err(e.into()),
		};

		let substituted_content = self.substitute_env_vars(&content)?;

		let config: Config = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns.
		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.orchestrator.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.orchestrator.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Ok(base_url) = env::var(format!("{}BASE_URL", self.env_prefix)) {
			config.orchestrator.base_url = base_url;
		}

		Ok(())
	}

	fn validate_config(&self, config: &Config) -> Result<(), ConfigError> {
		if config.orchestrator.base_url.is_empty() {
			return Err(ConfigError::ValidationError(
				"orchestrator.base_url must not be empty".to_string(),
			));
		}

		if config.orchestrator.allowed_currencies.is_empty() {
			return Err(ConfigError::ValidationError(
				"orchestrator.allowed_currencies must not be empty".to_string(),
			));
		}
		for currency in &config.orchestrator.allowed_currencies {
			if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
				return Err(ConfigError::ValidationError(format!(
					"Invalid currency code '{}': expected three uppercase letters",
					currency
				)));
			}
		}

		if !matches!(config.storage.backend.as_str(), "memory" | "file") {
			return Err(ConfigError::ValidationError(format!(
				"Unknown storage backend '{}'",
				config.storage.backend
			)));
		}

		if config.providers.is_empty() {
			return Err(ConfigError::ValidationError(
				"At least one provider must be configured".to_string(),
			));
		}
		let defaults = config.providers.values().filter(|p| p.default).count();
		if defaults > 1 {
			return Err(ConfigError::ValidationError(
				"At most one provider may be marked as default".to_string(),
			));
		}
		for (id, provider) in &config.providers {
			if !matches!(provider.provider_type.as_str(), "mock" | "rest") {
				return Err(ConfigError::ValidationError(format!(
					"Provider '{}' has unknown type '{}'",
					id, provider.provider_type
				)));
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const VALID_CONFIG: &str = r#"
[orchestrator]
name = "payments-local"
base_url = "https://payments.example"
http_port = 8080
allowed_currencies = ["RUB", "USD", "EUR"]

[storage]
backend = "memory"

[providers.mockpay]
type = "mock"
default = true
"#;

	fn write_config(content: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	#[tokio::test]
	async fn test_load_valid_config() {
		let file = write_config(VALID_CONFIG);
		let config = ConfigLoader::new().with_file(file.path()).load().await.unwrap();

		assert_eq!(config.orchestrator.name, "payments-local");
		assert_eq!(config.orchestrator.http_port, 8080);
		assert_eq!(config.orchestrator.log_level, "info");
		assert!(config.providers["mockpay"].default);
	}

	#[tokio::test]
	async fn test_missing_file_is_not_found() {
		let result = ConfigLoader::new().with_file("/does/not/exist.toml").load().await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
	}

	#[tokio::test]
	async fn test_env_substitution() {
		env::set_var("PAYMENT_TEST_BASE_URL", "https://from-env.example");
		let file = write_config(&VALID_CONFIG.replace(
			"https://payments.example",
			"${PAYMENT_TEST_BASE_URL}",
		));

		let config = ConfigLoader::new().with_file(file.path()).load().await.unwrap();
		assert_eq!(config.orchestrator.base_url, "https://from-env.example");
	}

	#[tokio::test]
	async fn test_unknown_env_var_fails() {
		let file = write_config(&VALID_CONFIG.replace(
			"https://payments.example",
			"${PAYMENT_TEST_UNSET_VARIABLE}",
		));

		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::EnvVarNotFound(_))));
	}

	#[tokio::test]
	async fn test_invalid_currency_code_rejected() {
		let file = write_config(&VALID_CONFIG.replace("\"EUR\"", "\"eur\""));
		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::ValidationError(_))));
	}

	#[tokio::test]
	async fn test_two_defaults_rejected() {
		let config = format!(
			"{}\n[providers.otherpay]\ntype = \"mock\"\ndefault = true\n",
			VALID_CONFIG
		);
		let file = write_config(&config);
		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::ValidationError(_))));
	}

	#[tokio::test]
	async fn test_unknown_storage_backend_rejected() {
		let file = write_config(&VALID_CONFIG.replace("\"memory\"", "\"postgres\""));
		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::ValidationError(_))));
	}
}
