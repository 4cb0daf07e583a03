//! Domain types for the payment orchestrator.
//!
//! This crate defines the payment entity and its lifecycle state machine,
//! the immutable payment event records that form the audit trail, the
//! error taxonomy shared across the workspace, and the inbound API payload
//! shapes.

pub mod api;
pub mod errors;
pub mod events;
pub mod payment;
pub mod status;

pub use api::*;
pub use errors::*;
pub use events::*;
pub use payment::*;
pub use status::*;
