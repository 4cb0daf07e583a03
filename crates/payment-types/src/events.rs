//! Immutable payment event records.
//!
//! Every lifecycle transition of a payment leaves behind a `PaymentEvent`.
//! Events form an append-only audit trail: they are created exclusively by
//! the orchestrator, never mutated, never deleted, and never replayed to
//! reconstruct payment state (the `Payment` row stays the source of truth).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One fact about something that happened to a payment.
///
/// The struct exposes no mutators; immutability is enforced by offering
/// none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
	/// Unique event id.
	pub id: String,
	/// Payment this fact belongs to.
	pub payment_id: String,
	/// What happened, with the type-specific payload.
	#[serde(flatten)]
	pub kind: PaymentEventKind,
	pub timestamp: DateTime<Utc>,
}

/// The fixed enumeration of event types and their payload shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PaymentEventKind {
	PaymentInitiated {
		amount: Decimal,
		currency: String,
		merchant_id: String,
		description: String,
	},
	PaymentLinkGenerated {
		payment_url: String,
		expires_at: DateTime<Utc>,
	},
	CustomerRedirected {
		user_agent: Option<String>,
		ip_address: Option<String>,
	},
	ProcessingStarted {
		provider_id: String,
		provider_transaction_id: String,
	},
	PaymentCompleted {
		provider_id: String,
		provider_transaction_id: String,
		completed_at: DateTime<Utc>,
	},
	PaymentFailed {
		error_code: String,
		error_message: String,
		is_retryable: bool,
	},
	RetryRequested {
		attempt_number: u32,
		reason: String,
	},
	PaymentCancelled {
		reason: String,
		cancelled_by: String,
	},
}

impl PaymentEvent {
	fn record(payment_id: &str, kind: PaymentEventKind) -> Self {
		Self {
			id: Uuid::new_v4().to_string(),
			payment_id: payment_id.to_string(),
			kind,
			timestamp: Utc::now(),
		}
	}

	pub fn payment_initiated(
		payment_id: &str,
		amount: Decimal,
		currency: &str,
		merchant_id: &str,
		description: &str,
	) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::PaymentInitiated {
				amount,
				currency: currency.to_string(),
				merchant_id: merchant_id.to_string(),
				description: description.to_string(),
			},
		)
	}

	pub fn payment_link_generated(
		payment_id: &str,
		payment_url: &str,
		expires_at: DateTime<Utc>,
	) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::PaymentLinkGenerated {
				payment_url: payment_url.to_string(),
				expires_at,
			},
		)
	}

	pub fn customer_redirected(
		payment_id: &str,
		user_agent: Option<String>,
		ip_address: Option<String>,
	) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::CustomerRedirected {
				user_agent,
				ip_address,
			},
		)
	}

	pub fn processing_started(
		payment_id: &str,
		provider_id: &str,
		provider_transaction_id: &str,
	) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::ProcessingStarted {
				provider_id: provider_id.to_string(),
				provider_transaction_id: provider_transaction_id.to_string(),
			},
		)
	}

	pub fn payment_completed(
		payment_id: &str,
		provider_id: &str,
		provider_transaction_id: &str,
		completed_at: DateTime<Utc>,
	) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::PaymentCompleted {
				provider_id: provider_id.to_string(),
				provider_transaction_id: provider_transaction_id.to_string(),
				completed_at,
			},
		)
	}

	pub fn payment_failed(
		payment_id: &str,
		error_code: &str,
		error_message: &str,
		is_retryable: bool,
	) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::PaymentFailed {
				error_code: error_code.to_string(),
				error_message: error_message.to_string(),
				is_retryable,
			},
		)
	}

	pub fn retry_requested(payment_id: &str, attempt_number: u32, reason: &str) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::RetryRequested {
				attempt_number,
				reason: reason.to_string(),
			},
		)
	}

	pub fn payment_cancelled(payment_id: &str, reason: &str, cancelled_by: &str) -> Self {
		Self::record(
			payment_id,
			PaymentEventKind::PaymentCancelled {
				reason: reason.to_string(),
				cancelled_by: cancelled_by.to_string(),
			},
		)
	}
}
