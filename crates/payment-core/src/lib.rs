//! Core orchestration logic for the payment lifecycle.
//!
//! This crate owns the rules of the payment state machine at runtime: the
//! [`PaymentOrchestrator`] drives creation, webhook ingestion, bounded
//! retries and best-effort cancellation, and the [`EventLog`] records every
//! transition as an immutable audit fact.

pub mod event_log;
pub mod orchestrator;

pub use event_log::EventLog;
pub use orchestrator::PaymentOrchestrator;
