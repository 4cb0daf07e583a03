//! Request and response shapes for the payment HTTP API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound payment creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
	pub amount: Decimal,
	pub currency: String,
	pub merchant_id: String,
	pub description: String,
	/// Explicit provider choice; the registry default is used when absent.
	pub provider_id: Option<String>,
}

/// Response to a successful payment creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
	pub payment_id: String,
	pub payment_url: String,
}

/// Provider-agnostic webhook payload.
///
/// The provider id is never trusted from the body; it arrives out of band
/// from the webhook route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
	pub payment_id: String,
	pub provider_transaction_id: String,
	/// Provider-specific status string, mapped by the originating provider.
	pub status: String,
	pub error_code: Option<String>,
	pub error_message: Option<String>,
	#[serde(default)]
	pub metadata: HashMap<String, serde_json::Value>,
}

/// Body of a retry request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPaymentRequest {
	pub reason: String,
}

/// Body of a cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPaymentRequest {
	pub reason: String,
	pub cancelled_by: String,
}
