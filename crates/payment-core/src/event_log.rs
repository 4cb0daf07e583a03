//! Append-only log of payment events.

use std::sync::Arc;

use payment_storage::{StorageError, StorageService};
use payment_types::{PaymentError, PaymentEvent};

const NAMESPACE: &str = "payment_events";

/// Append-only view over the event collection.
///
/// Offers no update or delete operation; immutability of recorded events
/// is enforced by the absence of mutators. Events are read back only for
/// audit queries, never to reconstruct payment state.
pub struct EventLog {
	storage: Arc<StorageService>,
}

impl EventLog {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Appends an event to the log.
	pub async fn append(&self, event: &PaymentEvent) -> Result<(), PaymentError> {
		self.storage
			.store(NAMESPACE, &event.id, event)
			.await
			.map_err(storage_error)
	}

	/// Looks up a single event by id.
	pub async fn get(&self, event_id: &str) -> Result<Option<PaymentEvent>, PaymentError> {
		self.storage
			.retrieve_opt(NAMESPACE, event_id)
			.await
			.map_err(storage_error)
	}

	/// Returns every event recorded for a payment, oldest first.
	pub async fn find_by_payment(
		&self,
		payment_id: &str,
	) -> Result<Vec<PaymentEvent>, PaymentError> {
		let mut events: Vec<PaymentEvent> = self
			.storage
			.find(NAMESPACE, |event: &PaymentEvent| event.payment_id == payment_id)
			.await
			.map_err(storage_error)?;

		// Timestamp order; the id breaks exact ties deterministically.
		events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
		Ok(events)
	}
}

pub(crate) fn storage_error(err: StorageError) -> PaymentError {
	PaymentError::Storage(err.to_string())
}
