//! Payment lifecycle states and the legal-transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a payment.
///
/// The happy path is `Created → AwaitingPayment → Processing → Completed`,
/// with `Failed` and `Cancelled` as side branches. `Failed` is retryable
/// and therefore not terminal; `Completed` and `Cancelled` are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	Created,
	AwaitingPayment,
	Processing,
	Completed,
	Failed,
	Cancelled,
}

impl PaymentStatus {
	/// Legal transition targets from this state.
	///
	/// The match is exhaustive so that adding a state forces this table
	/// to be revisited.
	pub fn allowed_transitions(&self) -> &'static [PaymentStatus] {
		use PaymentStatus::*;

		match self {
			Created => &[AwaitingPayment, Failed],
			AwaitingPayment => &[Processing, Cancelled, Failed],
			Processing => &[Completed, Failed],
			Completed => &[],
			// Re-entry into the flow is only possible via retry.
			Failed => &[AwaitingPayment],
			Cancelled => &[],
		}
	}

	/// Pure predicate: is `target` reachable from this state in one step?
	pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
		self.allowed_transitions().contains(&target)
	}

	/// Whether the state has no outgoing transitions.
	///
	/// `Failed` is deliberately not final: a failed payment stays
	/// eligible for a bounded number of retries.
	pub fn is_final(&self) -> bool {
		matches!(self, PaymentStatus::Completed | PaymentStatus::Cancelled)
	}
}

impl std::fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Created => write!(f, "created"),
			Self::AwaitingPayment => write!(f, "awaiting_payment"),
			Self::Processing => write!(f, "processing"),
			Self::Completed => write!(f, "completed"),
			Self::Failed => write!(f, "failed"),
			Self::Cancelled => write!(f, "cancelled"),
		}
	}
}
