//! The payment entity.
//!
//! A `Payment` is the authoritative record of one merchant payment attempt.
//! Its status moves along the transition table in [`crate::status`], and the
//! orchestrator is the only writer. Payments are never deleted; terminal
//! states are retained for audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PaymentStatus;

/// Authoritative record of one merchant payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
	/// Opaque unique identifier, immutable once assigned.
	pub id: String,
	/// Current lifecycle state.
	pub status: PaymentStatus,
	/// Positive amount, immutable after creation.
	pub amount: Decimal,
	/// ISO 4217 three-letter code, immutable after creation.
	pub currency: String,
	/// Merchant on whose behalf the payment is collected.
	pub merchant_id: String,
	/// Human-readable purpose of the payment.
	pub description: String,
	/// Provider that owns this payment, immutable after creation.
	pub provider_id: String,
	/// Client-facing checkout URL, set once the provider responds.
	pub payment_url: Option<String>,
	/// The provider's own identifier for this payment.
	pub provider_transaction_id: Option<String>,
	/// Successful retry attempts so far.
	pub retry_count: u32,
	pub created_at: DateTime<Utc>,
	/// Bumped on every mutation.
	pub updated_at: DateTime<Utc>,
}

impl Payment {
	/// Creates a fresh payment in the `Created` state with a new id.
	pub fn new(
		amount: Decimal,
		currency: impl Into<String>,
		merchant_id: impl Into<String>,
		description: impl Into<String>,
		provider_id: impl Into<String>,
	) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4().to_string(),
			status: PaymentStatus::Created,
			amount,
			currency: currency.into(),
			merchant_id: merchant_id.into(),
			description: description.into(),
			provider_id: provider_id.into(),
			payment_url: None,
			provider_transaction_id: None,
			retry_count: 0,
			created_at: now,
			updated_at: now,
		}
	}

	/// Pure predicate over the transition table; no side effects.
	pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
		self.status.can_transition_to(target)
	}

	/// Unconditionally sets the status and bumps `updated_at`.
	///
	/// Callers must have already consulted [`Payment::can_transition_to`];
	/// the entity does not re-check here so that the orchestrator can
	/// raise domain-specific errors instead of a generic rejection.
	pub fn update_status(&mut self, target: PaymentStatus) {
		self.status = target;
		self.touch();
	}

	pub fn set_payment_url(&mut self, url: impl Into<String>) {
		self.payment_url = Some(url.into());
		self.touch();
	}

	pub fn set_provider_transaction_id(&mut self, tx_id: impl Into<String>) {
		self.provider_transaction_id = Some(tx_id.into());
		self.touch();
	}

	pub fn increment_retry_count(&mut self) {
		self.retry_count += 1;
		self.touch();
	}

	/// Whether the payment reached a terminal state.
	pub fn is_final(&self) -> bool {
		self.status.is_final()
	}

	fn touch(&mut self) {
		self.updated_at = Utc::now();
	}
}
