//! Generic JSON-over-HTTP gateway client.
//!
//! Many hosted payment gateways expose the same basic shape: create a
//! payment, poll it, cancel it. `RestProvider` speaks that shape against a
//! configured base URL; gateway-specific status vocabulary comes in as a
//! plain mapping table so one client covers many remotes.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::{
	PaymentProvider, ProviderPaymentDetails, ProviderPaymentRequest, ProviderStatusReport,
};
use payment_types::{PaymentError, PaymentStatus};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LINK_TTL_MINUTES: i64 = 60;

/// HTTP payment provider talking to a configurable gateway endpoint.
#[derive(Debug)]
pub struct RestProvider {
	id: String,
	base_url: String,
	api_key: String,
	currencies: HashSet<String>,
	/// Gateway status string -> internal status.
	status_map: HashMap<String, PaymentStatus>,
	client: reqwest::Client,
}

/// Gateway response to a payment creation call.
#[derive(Debug, Deserialize)]
struct GatewayPaymentResponse {
	transaction_id: String,
	payment_url: String,
	expires_at: Option<DateTime<Utc>>,
	#[serde(default)]
	metadata: HashMap<String, serde_json::Value>,
}

/// Gateway response to a status query.
#[derive(Debug, Deserialize)]
struct GatewayStatusResponse {
	transaction_id: String,
	status: String,
	error_code: Option<String>,
	#[serde(default)]
	metadata: HashMap<String, serde_json::Value>,
}

impl RestProvider {
	pub fn new(
		id: impl Into<String>,
		base_url: impl Into<String>,
		api_key: impl Into<String>,
		currencies: Vec<String>,
		status_map: HashMap<String, PaymentStatus>,
	) -> Result<Self, PaymentError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
			.build()
			.map_err(|e| PaymentError::ExternalService(e.to_string()))?;

		Ok(Self {
			id: id.into(),
			base_url: base_url.into(),
			api_key: api_key.into(),
			currencies: currencies.into_iter().collect(),
			status_map,
			client,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/{}", self.base_url.trim_end_matches('/'), path)
	}

	fn external(&self, context: &str, err: impl std::fmt::Display) -> PaymentError {
		PaymentError::ExternalService(format!("{}: {}: {}", self.id, context, err))
	}

	async fn check_response(
		&self,
		context: &str,
		response: reqwest::Response,
	) -> Result<reqwest::Response, PaymentError> {
		if response.status().is_success() {
			Ok(response)
		} else {
			let status = response.status();
			let body = response.text().await.unwrap_or_default();
			Err(self.external(context, format!("HTTP {}: {}", status, body)))
		}
	}
}

#[async_trait]
impl PaymentProvider for RestProvider {
	fn id(&self) -> &str {
		&self.id
	}

	async fn create_payment(
		&self,
		request: ProviderPaymentRequest,
	) -> Result<ProviderPaymentDetails, PaymentError> {
		debug!(provider_id = %self.id, payment_id = %request.payment_id, "creating remote payment");

		let body = serde_json::json!({
			"reference": request.payment_id,
			"amount": request.amount,
			"currency": request.currency,
			"description": request.description,
			"merchant_id": request.merchant_id,
			"callback_url": request.callback_url,
		});

		let response = self
			.client
			.post(self.url("payments"))
			.bearer_auth(&self.api_key)
			.json(&body)
			.send()
			.await
			.map_err(|e| self.external("create payment", e))?;
		let response = self.check_response("create payment", response).await?;

		let payload: GatewayPaymentResponse = response
			.json()
			.await
			.map_err(|e| self.external("create payment", e))?;

		Ok(ProviderPaymentDetails {
			provider_transaction_id: payload.transaction_id,
			payment_url: payload.payment_url,
			expires_at: payload
				.expires_at
				.unwrap_or_else(|| Utc::now() + ChronoDuration::minutes(DEFAULT_LINK_TTL_MINUTES)),
			metadata: payload.metadata,
		})
	}

	async fn check_payment_status(
		&self,
		provider_transaction_id: &str,
	) -> Result<ProviderStatusReport, PaymentError> {
		let response = self
			.client
			.get(self.url(&format!("payments/{}", provider_transaction_id)))
			.bearer_auth(&self.api_key)
			.send()
			.await
			.map_err(|e| self.external("check status", e))?;
		let response = self.check_response("check status", response).await?;

		let payload: GatewayStatusResponse = response
			.json()
			.await
			.map_err(|e| self.external("check status", e))?;

		Ok(ProviderStatusReport {
			status: payload.status,
			provider_transaction_id: payload.transaction_id,
			error_code: payload.error_code,
			metadata: payload.metadata,
		})
	}

	async fn cancel_payment(
		&self,
		provider_transaction_id: &str,
		reason: &str,
	) -> Result<(), PaymentError> {
		debug!(provider_id = %self.id, provider_transaction_id, "cancelling remote payment");

		let response = self
			.client
			.post(self.url(&format!("payments/{}/cancel", provider_transaction_id)))
			.bearer_auth(&self.api_key)
			.json(&serde_json::json!({ "reason": reason }))
			.send()
			.await
			.map_err(|e| self.external("cancel payment", e))?;
		self.check_response("cancel payment", response).await?;

		Ok(())
	}

	fn supports_currency(&self, currency: &str) -> bool {
		self.currencies.contains(currency)
	}

	fn map_status(&self, provider_status: &str) -> Result<PaymentStatus, PaymentError> {
		self.status_map.get(provider_status).copied().ok_or_else(|| {
			PaymentError::Validation(format!(
				"Provider '{}' reported unrecognized status '{}'",
				self.id, provider_status
			))
		})
	}
}
