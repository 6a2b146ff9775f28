//! `relay-core`: shared building blocks.
//!
//! Identifiers and the base error type used by the job, cache and API crates.
//! No infrastructure concerns live here.

pub mod error;
pub mod id;

pub use error::{CoreError, CoreResult};
pub use id::{CorrelationId, TaskId, UserId};

/// Free-form JSON object used for unit arguments, outputs and request payloads.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
