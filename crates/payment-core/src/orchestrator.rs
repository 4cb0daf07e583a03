//! The payment orchestrator.
//!
//! Composes the provider registry, the payment store and the event log
//! into the service that owns every lifecycle transition. All guards live
//! here: the `Payment` entity itself applies status changes unchecked, and
//! the orchestrator decides when a change is legal and which domain error
//! to raise when it is not.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use payment_provider::{PaymentProvider, ProviderPaymentRequest, ProviderRegistry};
use payment_storage::StorageService;
use payment_types::{
	CreatePaymentRequest, CreatePaymentResponse, Payment, PaymentError, PaymentEvent,
	PaymentStatus, WebhookPayload,
};

use crate::event_log::{storage_error, EventLog};

const PAYMENTS_NAMESPACE: &str = "payments";

/// Hard cap on retry attempts per payment.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Drives the payment lifecycle end to end.
///
/// Mutating operations against the same payment id are serialized through
/// a per-id lock table, so a load/guard/mutate sequence can never
/// interleave with another writer in a multi-threaded host.
pub struct PaymentOrchestrator {
	registry: Arc<ProviderRegistry>,
	storage: Arc<StorageService>,
	events: EventLog,
	/// Public base URL used to derive provider callback URLs.
	base_url: String,
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PaymentOrchestrator {
	pub fn new(
		registry: Arc<ProviderRegistry>,
		storage: Arc<StorageService>,
		base_url: impl Into<String>,
	) -> Self {
		let events = EventLog::new(storage.clone());
		Self {
			registry,
			storage,
			events,
			base_url: base_url.into(),
			locks: DashMap::new(),
		}
	}

	/// Read-only access to the event log.
	pub fn events(&self) -> &EventLog {
		&self.events
	}

	/// Creates a payment and opens it at the selected provider.
	///
	/// The payment row always exists once allocated, even when the remote
	/// call fails: the failure path leaves it in `failed` (which stays
	/// retryable) rather than half-written, and re-raises the provider
	/// error to the caller.
	pub async fn create_payment(
		&self,
		request: CreatePaymentRequest,
	) -> Result<CreatePaymentResponse, PaymentError> {
		let provider = match &request.provider_id {
			Some(id) => self.registry.get(id)?,
			None => self.registry.get_default()?,
		};

		if request.amount.is_zero() || request.amount.is_sign_negative() {
			return Err(PaymentError::Validation(format!(
				"Amount must be positive, got {}",
				request.amount
			)));
		}
		if !provider.supports_currency(&request.currency) {
			return Err(PaymentError::Validation(format!(
				"Provider '{}' does not support currency '{}'",
				provider.id(),
				request.currency
			)));
		}

		let mut payment = Payment::new(
			request.amount,
			request.currency.clone(),
			request.merchant_id.clone(),
			request.description.clone(),
			provider.id(),
		);
		info!(payment_id = %payment.id, provider_id = %provider.id(), "creating payment");
		self.save(&payment).await?;

		self.events
			.append(&PaymentEvent::payment_initiated(
				&payment.id,
				payment.amount,
				&payment.currency,
				&payment.merchant_id,
				&payment.description,
			))
			.await?;

		match provider
			.create_payment(self.provider_request(&payment))
			.await
		{
			Ok(details) => {
				payment.set_payment_url(&details.payment_url);
				payment.set_provider_transaction_id(&details.provider_transaction_id);
				self.transition(&mut payment, PaymentStatus::AwaitingPayment)?;
				self.save(&payment).await?;

				self.events
					.append(&PaymentEvent::payment_link_generated(
						&payment.id,
						&details.payment_url,
						details.expires_at,
					))
					.await?;

				info!(payment_id = %payment.id, "payment link generated");
				Ok(CreatePaymentResponse {
					payment_id: payment.id,
					payment_url: details.payment_url,
				})
			}
			Err(err) => {
				warn!(payment_id = %payment.id, error = %err, "provider rejected payment creation");
				self.transition(&mut payment, PaymentStatus::Failed)?;
				self.save(&payment).await?;

				// Creation failures are not retryable automatically; the
				// caller decides whether to invoke an explicit retry.
				self.events
					.append(&PaymentEvent::payment_failed(
						&payment.id,
						"provider_creation_failed",
						&err.to_string(),
						false,
					))
					.await?;

				Err(err)
			}
		}
	}

	/// Looks up a payment by id.
	pub async fn get_payment(&self, payment_id: &str) -> Result<Payment, PaymentError> {
		self.load(payment_id).await
	}

	/// Returns the audit trail of a payment, oldest event first.
	pub async fn get_payment_events(
		&self,
		payment_id: &str,
	) -> Result<Vec<PaymentEvent>, PaymentError> {
		// Resolve the payment first so an unknown id surfaces as NotFound
		// rather than an empty list.
		self.load(payment_id).await?;
		self.events.find_by_payment(payment_id).await
	}

	/// Records that the customer was redirected to the checkout page.
	///
	/// Only meaningful while the payment is awaiting the customer; appends
	/// an event without mutating payment state.
	pub async fn record_customer_redirect(
		&self,
		payment_id: &str,
		user_agent: Option<String>,
		ip_address: Option<String>,
	) -> Result<(), PaymentError> {
		let _guard = self.lock(payment_id).await;
		let payment = self.load(payment_id).await?;

		if payment.status != PaymentStatus::AwaitingPayment {
			return Err(PaymentError::IllegalOperation(format!(
				"Redirect can only be recorded while awaiting payment, current status is '{}'",
				payment.status
			)));
		}

		self.events
			.append(&PaymentEvent::customer_redirected(
				payment_id, user_agent, ip_address,
			))
			.await
	}

	/// Ingests a provider status notification.
	///
	/// Advisory transitions into in-flight states are deduplicated
	/// silently, because providers may legitimately resend them.
	/// Transitions into terminal states are authoritative: if the current
	/// state does not legally allow them, the call fails loudly instead of
	/// risking a double-credit or double-fail.
	pub async fn process_webhook(
		&self,
		provider_id: &str,
		webhook: WebhookPayload,
	) -> Result<(), PaymentError> {
		let _guard = self.lock(&webhook.payment_id).await;
		let mut payment = self.load(&webhook.payment_id).await?;

		// A webhook routed for one provider must never touch a payment
		// owned by another.
		if payment.provider_id != provider_id {
			return Err(PaymentError::Validation(format!(
				"Webhook provider '{}' does not match payment provider '{}'",
				provider_id, payment.provider_id
			)));
		}

		let provider = self.registry.get(provider_id)?;
		let target = provider.map_status(&webhook.status)?;

		debug!(
			payment_id = %payment.id,
			provider_id,
			current = %payment.status,
			target = %target,
			"processing webhook"
		);

		if payment.provider_transaction_id.is_none() {
			payment.set_provider_transaction_id(&webhook.provider_transaction_id);
			self.save(&payment).await?;
		}

		match target {
			PaymentStatus::Created | PaymentStatus::AwaitingPayment => {
				// Duplicate "still pending" notifications are tolerated
				// silently; only the first advance out of Created counts.
				if payment.status == PaymentStatus::Created && payment.can_transition_to(target) {
					payment.update_status(target);
					self.save(&payment).await?;
				}
			}
			PaymentStatus::Processing => {
				// A repeated processing notification fails the guard and
				// the whole branch is skipped; that is the idempotency
				// mechanism, not an error path.
				if payment.can_transition_to(PaymentStatus::Processing) {
					payment.update_status(PaymentStatus::Processing);
					self.save(&payment).await?;

					self.events
						.append(&PaymentEvent::processing_started(
							&payment.id,
							provider_id,
							&webhook.provider_transaction_id,
						))
						.await?;
					info!(payment_id = %payment.id, "payment processing started");
				}
			}
			PaymentStatus::Completed => {
				self.transition(&mut payment, PaymentStatus::Completed)?;
				self.save(&payment).await?;

				self.events
					.append(&PaymentEvent::payment_completed(
						&payment.id,
						provider_id,
						&webhook.provider_transaction_id,
						Utc::now(),
					))
					.await?;
				info!(payment_id = %payment.id, "payment completed");
			}
			PaymentStatus::Failed => {
				self.transition(&mut payment, PaymentStatus::Failed)?;
				self.save(&payment).await?;

				// Webhook-driven failures stay eligible for retry, unlike
				// creation failures raised by the orchestrator itself.
				self.events
					.append(&PaymentEvent::payment_failed(
						&payment.id,
						webhook.error_code.as_deref().unwrap_or("provider_failure"),
						webhook
							.error_message
							.as_deref()
							.unwrap_or("Payment failed at provider"),
						true,
					))
					.await?;
				info!(payment_id = %payment.id, "payment failed at provider");
			}
			PaymentStatus::Cancelled => {
				self.transition(&mut payment, PaymentStatus::Cancelled)?;
				self.save(&payment).await?;

				self.events
					.append(&PaymentEvent::payment_cancelled(
						&payment.id,
						"Cancelled by provider",
						provider_id,
					))
					.await?;
				info!(payment_id = %payment.id, "payment cancelled by provider");
			}
		}

		Ok(())
	}

	/// Re-attempts a failed payment, bounded by [`MAX_RETRY_ATTEMPTS`].
	///
	/// A provider failure during the retry propagates unchanged and leaves
	/// the payment exactly as it was: retries never record a failure of
	/// their own, so attempts are not double-counted.
	pub async fn retry_payment(
		&self,
		payment_id: &str,
		reason: &str,
	) -> Result<CreatePaymentResponse, PaymentError> {
		let _guard = self.lock(payment_id).await;
		let mut payment = self.load(payment_id).await?;

		if payment.status != PaymentStatus::Failed {
			return Err(PaymentError::IllegalOperation(format!(
				"Retry requires status 'failed', current status is '{}'",
				payment.status
			)));
		}
		if payment.retry_count >= MAX_RETRY_ATTEMPTS {
			return Err(PaymentError::Validation(format!(
				"Retry limit of {} attempts exhausted",
				MAX_RETRY_ATTEMPTS
			)));
		}

		let provider = self.registry.get(&payment.provider_id)?;
		let details = provider
			.create_payment(self.provider_request(&payment))
			.await?;

		payment.increment_retry_count();
		payment.set_payment_url(&details.payment_url);
		payment.set_provider_transaction_id(&details.provider_transaction_id);
		self.transition(&mut payment, PaymentStatus::AwaitingPayment)?;
		self.save(&payment).await?;

		self.events
			.append(&PaymentEvent::retry_requested(
				payment_id,
				payment.retry_count,
				reason,
			))
			.await?;

		info!(
			payment_id,
			attempt = payment.retry_count,
			"payment retry succeeded"
		);
		Ok(CreatePaymentResponse {
			payment_id: payment.id,
			payment_url: details.payment_url,
		})
	}

	/// Cancels a payment locally, best-effort cancelling the remote leg.
	pub async fn cancel_payment(
		&self,
		payment_id: &str,
		reason: &str,
		cancelled_by: &str,
	) -> Result<(), PaymentError> {
		let _guard = self.lock(payment_id).await;
		let mut payment = self.load(payment_id).await?;

		if !payment.can_transition_to(PaymentStatus::Cancelled) {
			return Err(PaymentError::InvalidState {
				from: payment.status,
				to: PaymentStatus::Cancelled,
			});
		}

		if let Some(tx_id) = payment.provider_transaction_id.clone() {
			// Policy: the remote leg is best-effort. The local system of
			// record must reflect the caller's cancellation intent even
			// when the remote is unreachable or already settled, so any
			// failure here is logged and swallowed.
			let remote = match self.registry.get(&payment.provider_id) {
				Ok(provider) => provider.cancel_payment(&tx_id, reason).await,
				Err(err) => Err(err),
			};
			if let Err(err) = remote {
				warn!(
					payment_id,
					provider_id = %payment.provider_id,
					error = %err,
					"remote cancellation failed, proceeding with local cancellation"
				);
			}
		}

		self.transition(&mut payment, PaymentStatus::Cancelled)?;
		self.save(&payment).await?;

		self.events
			.append(&PaymentEvent::payment_cancelled(
				payment_id,
				reason,
				cancelled_by,
			))
			.await?;

		info!(payment_id, cancelled_by, "payment cancelled");
		Ok(())
	}

	/// Guard-then-mutate: the single place a checked transition happens.
	fn transition(
		&self,
		payment: &mut Payment,
		target: PaymentStatus,
	) -> Result<(), PaymentError> {
		if !payment.can_transition_to(target) {
			return Err(PaymentError::InvalidState {
				from: payment.status,
				to: target,
			});
		}
		payment.update_status(target);
		Ok(())
	}

	fn provider_request(&self, payment: &Payment) -> ProviderPaymentRequest {
		ProviderPaymentRequest {
			payment_id: payment.id.clone(),
			amount: payment.amount,
			currency: payment.currency.clone(),
			description: payment.description.clone(),
			merchant_id: payment.merchant_id.clone(),
			callback_url: format!(
				"{}/webhooks/{}",
				self.base_url.trim_end_matches('/'),
				payment.provider_id
			),
		}
	}

	async fn load(&self, payment_id: &str) -> Result<Payment, PaymentError> {
		self.storage
			.retrieve_opt(PAYMENTS_NAMESPACE, payment_id)
			.await
			.map_err(storage_error)?
			.ok_or_else(|| PaymentError::NotFound(format!("Payment '{}' not found", payment_id)))
	}

	async fn save(&self, payment: &Payment) -> Result<(), PaymentError> {
		self.storage
			.store(PAYMENTS_NAMESPACE, &payment.id, payment)
			.await
			.map_err(storage_error)
	}

	/// Serializes mutating operations per payment id. Entries are kept for
	/// the process lifetime, matching the never-delete retention of the
	/// payments themselves.
	async fn lock(&self, payment_id: &str) -> OwnedMutexGuard<()> {
		let mutex = self
			.locks
			.entry(payment_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		mutex.lock_owned().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use payment_provider::MockProvider;
	use payment_storage::MemoryStorage;
	use payment_types::PaymentEventKind;
	use rust_decimal_macros::dec;

	struct Fixture {
		orchestrator: PaymentOrchestrator,
		provider: Arc<MockProvider>,
	}

	fn fixture_with(provider: MockProvider) -> Fixture {
		let provider = Arc::new(provider);
		let mut registry = ProviderRegistry::new();
		registry.register(provider.clone(), true);

		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let orchestrator = PaymentOrchestrator::new(
			Arc::new(registry),
			storage,
			"https://orchestrator.example",
		);

		Fixture {
			orchestrator,
			provider,
		}
	}

	fn fixture() -> Fixture {
		fixture_with(MockProvider::new("mockpay"))
	}

	fn request() -> CreatePaymentRequest {
		CreatePaymentRequest {
			amount: dec!(1000),
			currency: "RUB".into(),
			merchant_id: "merchant-1".into(),
			description: "Order #42".into(),
			provider_id: None,
		}
	}

	fn webhook(payment_id: &str, status: &str) -> WebhookPayload {
		WebhookPayload {
			payment_id: payment_id.into(),
			provider_transaction_id: "tx-1".into(),
			status: status.into(),
			error_code: None,
			error_message: None,
			metadata: Default::default(),
		}
	}

	fn event_kinds(events: &[PaymentEvent]) -> Vec<&'static str> {
		events
			.iter()
			.map(|e| match e.kind {
				PaymentEventKind::PaymentInitiated { .. } => "initiated",
				PaymentEventKind::PaymentLinkGenerated { .. } => "link_generated",
				PaymentEventKind::CustomerRedirected { .. } => "redirected",
				PaymentEventKind::ProcessingStarted { .. } => "processing_started",
				PaymentEventKind::PaymentCompleted { .. } => "completed",
				PaymentEventKind::PaymentFailed { .. } => "failed",
				PaymentEventKind::RetryRequested { .. } => "retry_requested",
				PaymentEventKind::PaymentCancelled { .. } => "cancelled",
			})
			.collect()
	}

	#[tokio::test]
	async fn test_create_payment_happy_path() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();
		assert!(!response.payment_url.is_empty());

		let payment = fx.orchestrator.get_payment(&response.payment_id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::AwaitingPayment);
		assert_eq!(payment.retry_count, 0);
		assert!(payment.provider_transaction_id.is_some());
		assert_eq!(payment.payment_url.as_deref(), Some(response.payment_url.as_str()));

		let events = fx
			.orchestrator
			.get_payment_events(&response.payment_id)
			.await
			.unwrap();
		assert_eq!(event_kinds(&events), vec!["initiated", "link_generated"]);
	}

	#[tokio::test]
	async fn test_create_payment_unsupported_currency() {
		let fx = fixture_with(MockProvider::new("mockpay").with_currencies(&["USD"]));
		let mut req = request();
		req.currency = "JPY".into();

		let err = fx.orchestrator.create_payment(req).await.unwrap_err();
		assert!(err.is_validation());
	}

	#[tokio::test]
	async fn test_create_payment_rejects_non_positive_amount() {
		let fx = fixture();
		let mut req = request();
		req.amount = dec!(0);
		assert!(fx.orchestrator.create_payment(req).await.unwrap_err().is_validation());

		let mut req = request();
		req.amount = dec!(-5);
		assert!(fx.orchestrator.create_payment(req).await.unwrap_err().is_validation());
	}

	#[tokio::test]
	async fn test_create_payment_unknown_provider() {
		let fx = fixture();
		let mut req = request();
		req.provider_id = Some("ghost".into());

		let err = fx.orchestrator.create_payment(req).await.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn test_create_payment_without_default_provider() {
		let registry = ProviderRegistry::new();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let orchestrator =
			PaymentOrchestrator::new(Arc::new(registry), storage, "https://orchestrator.example");

		let err = orchestrator.create_payment(request()).await.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn test_create_payment_provider_failure_leaves_failed_row() {
		let fx = fixture_with(MockProvider::new("mockpay").with_failing_create());
		let err = fx.orchestrator.create_payment(request()).await.unwrap_err();
		assert!(err.is_external_service());

		// The row exists despite the remote failure, in a retryable state.
		let failed: Vec<Payment> = fx
			.orchestrator
			.storage
			.find(PAYMENTS_NAMESPACE, |p: &Payment| {
				p.status == PaymentStatus::Failed
			})
			.await
			.unwrap();
		assert_eq!(failed.len(), 1);

		let events = fx
			.orchestrator
			.get_payment_events(&failed[0].id)
			.await
			.unwrap();
		assert_eq!(event_kinds(&events), vec!["initiated", "failed"]);
		match &events[1].kind {
			PaymentEventKind::PaymentFailed { is_retryable, .. } => assert!(!*is_retryable),
			other => panic!("unexpected event kind: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_webhook_adopts_transaction_id() {
		let fx = fixture_with(MockProvider::new("mockpay").with_failing_create());
		let _ = fx.orchestrator.create_payment(request()).await;
		let payment: Vec<Payment> = fx
			.orchestrator
			.storage
			.find(PAYMENTS_NAMESPACE, |_: &Payment| true)
			.await
			.unwrap();
		let id = payment[0].id.clone();
		assert!(payment[0].provider_transaction_id.is_none());

		// A pending webhook on a failed payment is a silent no-op for the
		// status, but the transaction id is still adopted.
		fx.orchestrator
			.process_webhook("mockpay", webhook(&id, "pending"))
			.await
			.unwrap();

		let payment = fx.orchestrator.get_payment(&id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Failed);
		assert_eq!(payment.provider_transaction_id.as_deref(), Some("tx-1"));
	}

	#[tokio::test]
	async fn test_webhook_unknown_payment_is_not_found() {
		let fx = fixture();
		let err = fx
			.orchestrator
			.process_webhook("mockpay", webhook("missing", "processing"))
			.await
			.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn test_webhook_provider_mismatch_is_validation() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		let err = fx
			.orchestrator
			.process_webhook("otherpay", webhook(&response.payment_id, "processing"))
			.await
			.unwrap_err();
		assert!(err.is_validation());
	}

	#[tokio::test]
	async fn test_webhook_unrecognized_status_is_validation() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		let err = fx
			.orchestrator
			.process_webhook("mockpay", webhook(&response.payment_id, "mystery"))
			.await
			.unwrap_err();
		assert!(err.is_validation());

		// The failed mapping must not have touched anything.
		let payment = fx.orchestrator.get_payment(&response.payment_id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::AwaitingPayment);
	}

	#[tokio::test]
	async fn test_processing_webhook_is_idempotent() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();
		let id = &response.payment_id;

		fx.orchestrator
			.process_webhook("mockpay", webhook(id, "processing"))
			.await
			.unwrap();
		// The duplicate neither errors nor appends a second event.
		fx.orchestrator
			.process_webhook("mockpay", webhook(id, "processing"))
			.await
			.unwrap();

		let payment = fx.orchestrator.get_payment(id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Processing);

		let events = fx.orchestrator.get_payment_events(id).await.unwrap();
		assert_eq!(
			event_kinds(&events),
			vec!["initiated", "link_generated", "processing_started"]
		);
	}

	#[tokio::test]
	async fn test_pending_webhook_duplicates_are_silent() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		for _ in 0..3 {
			fx.orchestrator
				.process_webhook("mockpay", webhook(&response.payment_id, "pending"))
				.await
				.unwrap();
		}

		let payment = fx.orchestrator.get_payment(&response.payment_id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::AwaitingPayment);
		let events = fx
			.orchestrator
			.get_payment_events(&response.payment_id)
			.await
			.unwrap();
		assert_eq!(event_kinds(&events), vec!["initiated", "link_generated"]);
	}

	#[tokio::test]
	async fn test_completed_webhook_from_wrong_state_hard_fails() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();
		let id = &response.payment_id;

		// Still awaiting payment, never reached processing.
		let err = fx
			.orchestrator
			.process_webhook("mockpay", webhook(id, "succeeded"))
			.await
			.unwrap_err();
		assert!(err.is_invalid_state());

		// Status and event log are untouched by the rejection.
		let payment = fx.orchestrator.get_payment(id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::AwaitingPayment);
		let events = fx.orchestrator.get_payment_events(id).await.unwrap();
		assert_eq!(event_kinds(&events), vec!["initiated", "link_generated"]);
	}

	#[tokio::test]
	async fn test_failed_webhook_is_marked_retryable() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		let mut payload = webhook(&response.payment_id, "failed");
		payload.error_code = Some("card_declined".into());
		payload.error_message = Some("Insufficient funds".into());
		fx.orchestrator
			.process_webhook("mockpay", payload)
			.await
			.unwrap();

		let events = fx
			.orchestrator
			.get_payment_events(&response.payment_id)
			.await
			.unwrap();
		match &events.last().unwrap().kind {
			PaymentEventKind::PaymentFailed {
				error_code,
				is_retryable,
				..
			} => {
				assert_eq!(error_code, "card_declined");
				assert!(*is_retryable);
			}
			other => panic!("unexpected event kind: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_cancelled_webhook_attributes_provider() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		fx.orchestrator
			.process_webhook("mockpay", webhook(&response.payment_id, "canceled"))
			.await
			.unwrap();

		let payment = fx.orchestrator.get_payment(&response.payment_id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Cancelled);

		let events = fx
			.orchestrator
			.get_payment_events(&response.payment_id)
			.await
			.unwrap();
		match &events.last().unwrap().kind {
			PaymentEventKind::PaymentCancelled { cancelled_by, .. } => {
				assert_eq!(cancelled_by, "mockpay");
			}
			other => panic!("unexpected event kind: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_retry_after_creation_failure() {
		let fx = fixture_with(MockProvider::new("mockpay").with_failing_create());
		let _ = fx.orchestrator.create_payment(request()).await;
		let payment: Vec<Payment> = fx
			.orchestrator
			.storage
			.find(PAYMENTS_NAMESPACE, |_: &Payment| true)
			.await
			.unwrap();
		let id = payment[0].id.clone();

		fx.provider.set_fail_create(false);
		let response = fx.orchestrator.retry_payment(&id, "gateway recovered").await.unwrap();
		assert_eq!(response.payment_id, id);

		let payment = fx.orchestrator.get_payment(&id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::AwaitingPayment);
		assert_eq!(payment.retry_count, 1);

		let events = fx.orchestrator.get_payment_events(&id).await.unwrap();
		assert_eq!(
			event_kinds(&events),
			vec!["initiated", "failed", "retry_requested"]
		);
		match &events.last().unwrap().kind {
			PaymentEventKind::RetryRequested { attempt_number, reason } => {
				assert_eq!(*attempt_number, 1);
				assert_eq!(reason, "gateway recovered");
			}
			other => panic!("unexpected event kind: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_retry_provider_failure_propagates_without_mutation() {
		let fx = fixture_with(MockProvider::new("mockpay").with_failing_create());
		let _ = fx.orchestrator.create_payment(request()).await;
		let payment: Vec<Payment> = fx
			.orchestrator
			.storage
			.find(PAYMENTS_NAMESPACE, |_: &Payment| true)
			.await
			.unwrap();
		let id = payment[0].id.clone();

		// Provider still failing: the retry propagates the error and the
		// payment stays exactly as it was.
		let err = fx.orchestrator.retry_payment(&id, "try again").await.unwrap_err();
		assert!(err.is_external_service());

		let payment = fx.orchestrator.get_payment(&id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Failed);
		assert_eq!(payment.retry_count, 0);
	}

	#[tokio::test]
	async fn test_retry_requires_failed_status() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		let err = fx
			.orchestrator
			.retry_payment(&response.payment_id, "impatient")
			.await
			.unwrap_err();
		assert!(err.is_invalid_state());
	}

	#[tokio::test]
	async fn test_retry_cap_is_enforced() {
		let fx = fixture_with(MockProvider::new("mockpay").with_failing_create());
		let _ = fx.orchestrator.create_payment(request()).await;
		let payment: Vec<Payment> = fx
			.orchestrator
			.storage
			.find(PAYMENTS_NAMESPACE, |_: &Payment| true)
			.await
			.unwrap();
		let id = payment[0].id.clone();
		fx.provider.set_fail_create(false);

		// Three full retry cycles, each ending in failed again.
		for attempt in 1..=3u32 {
			fx.orchestrator.retry_payment(&id, "cycle").await.unwrap();
			let payment = fx.orchestrator.get_payment(&id).await.unwrap();
			assert_eq!(payment.retry_count, attempt);

			fx.orchestrator
				.process_webhook("mockpay", webhook(&id, "failed"))
				.await
				.unwrap();
		}

		let err = fx.orchestrator.retry_payment(&id, "one too many").await.unwrap_err();
		assert!(err.is_validation());

		let payment = fx.orchestrator.get_payment(&id).await.unwrap();
		assert_eq!(payment.retry_count, 3);
		assert_eq!(payment.status, PaymentStatus::Failed);
	}

	#[tokio::test]
	async fn test_cancel_payment_swallows_remote_failure() {
		let fx = fixture_with(MockProvider::new("mockpay").with_failing_cancel());
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		fx.orchestrator
			.cancel_payment(&response.payment_id, "changed my mind", "customer")
			.await
			.unwrap();

		// The remote leg was attempted and failed, local state still wins.
		assert_eq!(fx.provider.cancel_calls(), 1);
		let payment = fx.orchestrator.get_payment(&response.payment_id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Cancelled);

		let events = fx
			.orchestrator
			.get_payment_events(&response.payment_id)
			.await
			.unwrap();
		match &events.last().unwrap().kind {
			PaymentEventKind::PaymentCancelled { reason, cancelled_by } => {
				assert_eq!(reason, "changed my mind");
				assert_eq!(cancelled_by, "customer");
			}
			other => panic!("unexpected event kind: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_cancel_from_illegal_state() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();

		fx.orchestrator
			.process_webhook("mockpay", webhook(&response.payment_id, "processing"))
			.await
			.unwrap();

		// Processing payments cannot be cancelled.
		let err = fx
			.orchestrator
			.cancel_payment(&response.payment_id, "too late", "customer")
			.await
			.unwrap_err();
		assert!(err.is_invalid_state());
		assert_eq!(fx.provider.cancel_calls(), 0);
	}

	#[tokio::test]
	async fn test_redirect_only_while_awaiting_payment() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();
		let id = &response.payment_id;

		fx.orchestrator
			.record_customer_redirect(id, Some("Mozilla/5.0".into()), Some("10.0.0.1".into()))
			.await
			.unwrap();

		let events = fx.orchestrator.get_payment_events(id).await.unwrap();
		assert_eq!(
			event_kinds(&events),
			vec!["initiated", "link_generated", "redirected"]
		);
		// Redirect recording never mutates payment state.
		let payment = fx.orchestrator.get_payment(id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::AwaitingPayment);

		fx.orchestrator
			.process_webhook("mockpay", webhook(id, "processing"))
			.await
			.unwrap();
		let err = fx
			.orchestrator
			.record_customer_redirect(id, None, None)
			.await
			.unwrap_err();
		assert!(err.is_invalid_state());
	}

	#[tokio::test]
	async fn test_get_payment_events_unknown_id() {
		let fx = fixture();
		let err = fx.orchestrator.get_payment_events("missing").await.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn test_end_to_end_completion_scenario() {
		let fx = fixture();
		let response = fx.orchestrator.create_payment(request()).await.unwrap();
		let id = &response.payment_id;

		fx.orchestrator
			.process_webhook("mockpay", webhook(id, "processing"))
			.await
			.unwrap();
		fx.orchestrator
			.process_webhook("mockpay", webhook(id, "succeeded"))
			.await
			.unwrap();

		let payment = fx.orchestrator.get_payment(id).await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Completed);
		assert!(payment.is_final());

		let events = fx.orchestrator.get_payment_events(id).await.unwrap();
		assert_eq!(
			event_kinds(&events),
			vec![
				"initiated",
				"link_generated",
				"processing_started",
				"completed"
			]
		);
	}
}
