//! Deterministic in-process provider.
//!
//! Stands in for a real gateway in tests and local development. Supports
//! fault injection so callers can exercise the orchestrator's failure
//! paths without a network.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::{
	PaymentProvider, ProviderPaymentDetails, ProviderPaymentRequest, ProviderStatusReport,
};
use payment_types::{PaymentError, PaymentStatus};

/// In-process payment provider with configurable faults.
#[derive(Debug)]
pub struct MockProvider {
	id: String,
	currencies: HashSet<String>,
	fail_create: AtomicBool,
	fail_cancel: AtomicBool,
	cancel_calls: AtomicUsize,
}

impl MockProvider {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			currencies: ["RUB", "USD", "EUR"].iter().map(|c| c.to_string()).collect(),
			fail_create: AtomicBool::new(false),
			fail_cancel: AtomicBool::new(false),
			cancel_calls: AtomicUsize::new(0),
		}
	}

	/// Replaces the supported currency set.
	pub fn with_currencies(mut self, currencies: &[&str]) -> Self {
		self.currencies = currencies.iter().map(|c| c.to_string()).collect();
		self
	}

	/// Makes every `create_payment` call fail with an external-service error.
	pub fn with_failing_create(self) -> Self {
		self.fail_create.store(true, Ordering::SeqCst);
		self
	}

	/// Makes every `cancel_payment` call fail with an external-service error.
	pub fn with_failing_cancel(self) -> Self {
		self.fail_cancel.store(true, Ordering::SeqCst);
		self
	}

	/// Flips the create fault at runtime, letting a test fail the first
	/// attempt and succeed on retry.
	pub fn set_fail_create(&self, fail: bool) {
		self.fail_create.store(fail, Ordering::SeqCst);
	}

	/// How many times the remote cancel leg was attempted.
	pub fn cancel_calls(&self) -> usize {
		self.cancel_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PaymentProvider for MockProvider {
	fn id(&self) -> &str {
		&self.id
	}

	async fn create_payment(
		&self,
		request: ProviderPaymentRequest,
	) -> Result<ProviderPaymentDetails, PaymentError> {
		if self.fail_create.load(Ordering::SeqCst) {
			return Err(PaymentError::ExternalService(format!(
				"{}: gateway unavailable",
				self.id
			)));
		}

		let tx_id = format!("{}-tx-{}", self.id, Uuid::new_v4());
		Ok(ProviderPaymentDetails {
			payment_url: format!("https://{}.example/checkout/{}", self.id, tx_id),
			provider_transaction_id: tx_id,
			expires_at: Utc::now() + Duration::hours(1),
			metadata: Default::default(),
		})
	}

	async fn check_payment_status(
		&self,
		provider_transaction_id: &str,
	) -> Result<ProviderStatusReport, PaymentError> {
		Ok(ProviderStatusReport {
			status: "pending".to_string(),
			provider_transaction_id: provider_transaction_id.to_string(),
			error_code: None,
			metadata: Default::default(),
		})
	}

	async fn cancel_payment(
		&self,
		_provider_transaction_id: &str,
		_reason: &str,
	) -> Result<(), PaymentError> {
		self.cancel_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_cancel.load(Ordering::SeqCst) {
			return Err(PaymentError::ExternalService(format!(
				"{}: payment already settled",
				self.id
			)));
		}
		Ok(())
	}

	fn supports_currency(&self, currency: &str) -> bool {
		self.currencies.contains(currency)
	}

	fn map_status(&self, provider_status: &str) -> Result<PaymentStatus, PaymentError> {
		match provider_status {
			"created" => Ok(PaymentStatus::Created),
			"pending" => Ok(PaymentStatus::AwaitingPayment),
			"processing" => Ok(PaymentStatus::Processing),
			"succeeded" => Ok(PaymentStatus::Completed),
			"failed" => Ok(PaymentStatus::Failed),
			"canceled" => Ok(PaymentStatus::Cancelled),
			other => Err(PaymentError::Validation(format!(
				"Provider '{}' reported unrecognized status '{}'",
				self.id, other
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn request() -> ProviderPaymentRequest {
		ProviderPaymentRequest {
			payment_id: "p-1".into(),
			amount: dec!(10),
			currency: "USD".into(),
			description: "Order".into(),
			merchant_id: "m-1".into(),
			callback_url: "https://orchestrator.example/webhooks/mockpay".into(),
		}
	}

	#[tokio::test]
	async fn test_create_payment_returns_checkout_details() {
		let provider = MockProvider::new("mockpay");
		let details = provider.create_payment(request()).await.unwrap();
		assert!(details.payment_url.contains(&details.provider_transaction_id));
		assert!(details.expires_at > Utc::now());
	}

	#[tokio::test]
	async fn test_failing_create_is_external_service() {
		let provider = MockProvider::new("mockpay").with_failing_create();
		let err = provider.create_payment(request()).await.unwrap_err();
		assert!(err.is_external_service());
	}

	#[test]
	fn test_map_status_rejects_unknown_strings() {
		let provider = MockProvider::new("mockpay");
		assert_eq!(
			provider.map_status("succeeded").unwrap(),
			PaymentStatus::Completed
		);
		let err = provider.map_status("weird_state").unwrap_err();
		assert!(err.is_validation());
	}

	#[test]
	fn test_currency_support() {
		let provider = MockProvider::new("mockpay").with_currencies(&["GBP"]);
		assert!(provider.supports_currency("GBP"));
		assert!(!provider.supports_currency("USD"));
	}
}
