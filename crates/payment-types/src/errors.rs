//! Error taxonomy for the payment orchestrator.

use thiserror::Error;

use crate::PaymentStatus;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors surfaced by the orchestrator and its collaborators.
///
/// None of these trigger an automatic retry anywhere in the core; retry is
/// always an explicit caller-driven operation.
#[derive(Error, Debug)]
pub enum PaymentError {
	/// Malformed or unsupported input: unknown provider status string,
	/// unsupported currency, retry cap exceeded.
	#[error("Validation error: {0}")]
	Validation(String),

	/// Unknown payment, unknown provider, or no default provider.
	#[error("Not found: {0}")]
	NotFound(String),

	/// Operation illegal for the payment's current lifecycle state.
	#[error("Invalid state transition from {from} to {to}")]
	InvalidState {
		from: PaymentStatus,
		to: PaymentStatus,
	},

	/// Operation rejected by a state guard that is not a single transition.
	#[error("Invalid state: {0}")]
	IllegalOperation(String),

	/// Transport or remote failure talking to an external provider.
	#[error("External service error: {0}")]
	ExternalService(String),

	/// Persistence collaborator failure.
	#[error("Storage error: {0}")]
	Storage(String),
}

impl PaymentError {
	pub fn is_validation(&self) -> bool {
		matches!(self, Self::Validation(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}

	pub fn is_invalid_state(&self) -> bool {
		matches!(self, Self::InvalidState { .. } | Self::IllegalOperation(_))
	}

	pub fn is_external_service(&self) -> bool {
		matches!(self, Self::ExternalService(_))
	}
}
