//! HTTP API for the payment orchestrator.
//!
//! Thin transport layer: request-shape validation happens here, every
//! domain decision is delegated to the orchestrator. Webhooks carry the
//! provider id in the route, never in the body.

use axum::{
	extract::{ConnectInfo, Path, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use payment_core::PaymentOrchestrator;
use payment_types::{
	CancelPaymentRequest, CreatePaymentRequest, CreatePaymentResponse, Payment, PaymentError,
	PaymentEvent, RetryPaymentRequest, WebhookPayload,
};

#[derive(Clone)]
pub struct AppState {
	pub orchestrator: Arc<PaymentOrchestrator>,
	pub allowed_currencies: Arc<HashSet<String>>,
}

/// Maps domain errors onto HTTP statuses.
struct ApiError(PaymentError);

impl From<PaymentError> for ApiError {
	fn from(err: PaymentError) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self.0 {
			PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
			PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
			PaymentError::InvalidState { .. } | PaymentError::IllegalOperation(_) => {
				StatusCode::CONFLICT
			}
			PaymentError::ExternalService(_) => StatusCode::BAD_GATEWAY,
			PaymentError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};

		let body = Json(serde_json::json!({ "error": self.0.to_string() }));
		(status, body).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/payments", post(create_payment))
		.route("/payments/{id}", get(get_payment))
		.route("/payments/{id}/events", get(get_payment_events))
		.route("/payments/{id}/redirect", post(record_redirect))
		.route("/payments/{id}/retry", post(retry_payment))
		.route("/payments/{id}/cancel", post(cancel_payment))
		.route("/webhooks/{provider_id}", post(process_webhook))
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Binds and serves the API until the shutdown future resolves.
pub async fn serve(
	state: AppState,
	port: u16,
	shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
	let app = router(state);
	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

	info!("API server listening on port {}", port);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(shutdown)
	.await?;

	Ok(())
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

async fn create_payment(
	State(state): State<AppState>,
	Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
	if request.amount.is_zero() || request.amount.is_sign_negative() {
		return Err(PaymentError::Validation("Amount must be positive".to_string()).into());
	}
	if request.description.trim().is_empty() {
		return Err(PaymentError::Validation("Description must not be empty".to_string()).into());
	}
	if !state.allowed_currencies.contains(&request.currency) {
		return Err(PaymentError::Validation(format!(
			"Currency '{}' is not allowed",
			request.currency
		))
		.into());
	}

	let response = state.orchestrator.create_payment(request).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

async fn get_payment(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
	Ok(Json(state.orchestrator.get_payment(&id).await?))
}

async fn get_payment_events(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Vec<PaymentEvent>>, ApiError> {
	Ok(Json(state.orchestrator.get_payment_events(&id).await?))
}

async fn record_redirect(
	State(state): State<AppState>,
	Path(id): Path<String>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
	let user_agent = headers
		.get(axum::http::header::USER_AGENT)
		.and_then(|v| v.to_str().ok())
		.map(str::to_string);

	state
		.orchestrator
		.record_customer_redirect(&id, user_agent, Some(addr.ip().to_string()))
		.await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn retry_payment(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<RetryPaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
	Ok(Json(
		state.orchestrator.retry_payment(&id, &request.reason).await?,
	))
}

async fn cancel_payment(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<CancelPaymentRequest>,
) -> Result<StatusCode, ApiError> {
	state
		.orchestrator
		.cancel_payment(&id, &request.reason, &request.cancelled_by)
		.await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn process_webhook(
	State(state): State<AppState>,
	Path(provider_id): Path<String>,
	Json(payload): Json<WebhookPayload>,
) -> Result<StatusCode, ApiError> {
	state.orchestrator.process_webhook(&provider_id, payload).await?;
	Ok(StatusCode::OK)
}
