//! Provider abstraction for the payment orchestrator.
//!
//! Every external payment counterparty sits behind the [`PaymentProvider`]
//! capability trait, and the orchestrator reaches all of them through a
//! [`ProviderRegistry`] so it never has to know which concrete gateway a
//! payment belongs to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use payment_types::{PaymentError, PaymentStatus};

pub mod implementations {
	pub mod mock;
	pub mod rest;
}

pub use implementations::mock::MockProvider;
pub use implementations::rest::RestProvider;

/// Parameters for opening a payment at an external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPaymentRequest {
	pub payment_id: String,
	pub amount: Decimal,
	pub currency: String,
	pub description: String,
	pub merchant_id: String,
	/// URL the provider should notify about status changes.
	pub callback_url: String,
}

/// What a provider returns after opening a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPaymentDetails {
	/// The provider's own identifier for the payment.
	pub provider_transaction_id: String,
	/// Client-facing checkout URL.
	pub payment_url: String,
	/// When the checkout link stops working.
	pub expires_at: DateTime<Utc>,
	#[serde(default)]
	pub metadata: HashMap<String, serde_json::Value>,
}

/// A provider's answer to a status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusReport {
	/// Provider-specific status string; feed through `map_status`.
	pub status: String,
	pub provider_transaction_id: String,
	pub error_code: Option<String>,
	#[serde(default)]
	pub metadata: HashMap<String, serde_json::Value>,
}

/// Capability contract every payment provider must satisfy.
///
/// Implementations own their transport concerns: a remote that does not
/// answer in bounded time must surface as an
/// [`PaymentError::ExternalService`], never as a hang.
#[async_trait]
pub trait PaymentProvider: Send + Sync + std::fmt::Debug {
	/// Stable identifier this provider is registered under.
	fn id(&self) -> &str;

	/// Opens a payment at the remote provider.
	async fn create_payment(
		&self,
		request: ProviderPaymentRequest,
	) -> Result<ProviderPaymentDetails, PaymentError>;

	/// Queries the remote for the current status of a payment.
	async fn check_payment_status(
		&self,
		provider_transaction_id: &str,
	) -> Result<ProviderStatusReport, PaymentError>;

	/// Requests cancellation at the remote provider.
	///
	/// Fails with `ExternalService` when the remote cannot cancel, e.g.
	/// because the payment already settled.
	async fn cancel_payment(
		&self,
		provider_transaction_id: &str,
		reason: &str,
	) -> Result<(), PaymentError>;

	/// Whether this provider can collect in the given currency.
	fn supports_currency(&self, currency: &str) -> bool;

	/// Maps a provider-specific status string to an internal status.
	///
	/// Unrecognized strings are a hard `Validation` failure; a status the
	/// orchestrator cannot interpret must never be silently coerced into
	/// a transition.
	fn map_status(&self, provider_status: &str) -> Result<PaymentStatus, PaymentError>;
}

/// Registry of payment providers, keyed by provider id.
///
/// Built once at process start and treated as immutable afterwards.
/// Duplicate registrations silently overwrite; the last one wins.
#[derive(Default)]
pub struct ProviderRegistry {
	providers: HashMap<String, Arc<dyn PaymentProvider>>,
	default_id: Option<String>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a provider, optionally marking it as the default.
	pub fn register(&mut self, provider: Arc<dyn PaymentProvider>, is_default: bool) {
		let id = provider.id().to_string();
		tracing::debug!(provider_id = %id, is_default, "registering payment provider");
		if is_default {
			self.default_id = Some(id.clone());
		}
		self.providers.insert(id, provider);
	}

	/// Looks up a provider by id.
	pub fn get(&self, id: &str) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
		self.providers
			.get(id)
			.cloned()
			.ok_or_else(|| PaymentError::NotFound(format!("Provider '{}' is not registered", id)))
	}

	/// Returns the designated default provider.
	pub fn get_default(&self) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
		let id = self
			.default_id
			.as_deref()
			.ok_or_else(|| PaymentError::NotFound("No default provider registered".to_string()))?;
		self.get(id)
	}

	/// Lists every registered provider.
	pub fn all(&self) -> Vec<Arc<dyn PaymentProvider>> {
		self.providers.values().cloned().collect()
	}
}
