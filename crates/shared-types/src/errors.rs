//! # Error Types
//!
//! The error taxonomy surfaced by the core. Validation and change-request
//! errors propagate to callers; bookkeeping errors are logged where they occur
//! and never cross the audit recorder, bus or history boundaries.

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The targeted entity or record does not exist.
    #[error("{class_name} {row_key} not found")]
    ResourceNotFound { class_name: String, row_key: String },

    /// The actor may not perform this operation.
    #[error("actor {actor} is not authorized: {reason}")]
    AuthorizationDenied { actor: String, reason: String },

    /// Field-keyed validation messages.
    #[error("validation failed: {}", format_field_errors(.0))]
    ValidationFailed(BTreeMap<String, String>),

    /// A state machine refused the requested transition.
    #[error("illegal state transition from {from} to {to}")]
    IllegalStateTransition { from: String, to: String },

    /// A concurrent transaction won an optimistic transition.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    pub fn not_found(class_name: impl Into<String>, row_key: impl ToString) -> Self {
        Self::ResourceNotFound {
            class_name: class_name.into(),
            row_key: row_key.to_string(),
        }
    }

    pub fn denied(actor: impl ToString, reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            actor: actor.to_string(),
            reason: reason.into(),
        }
    }

    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), message.into());
        Self::ValidationFailed(errors)
    }

    /// Stable taxonomy name, recorded as `error_type` in failed event details.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResourceNotFound { .. } => "ResourceNotFound",
            Self::AuthorizationDenied { .. } => "AuthorizationDenied",
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::IllegalStateTransition { .. } => "IllegalStateTransition",
            Self::Conflict(_) => "Conflict",
            Self::Storage(_) => "Storage",
            Self::Serialization(_) => "Serialization",
        }
    }

    /// HTTP-equivalent status for the presentation layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed(_) | Self::Serialization(_) => 400,
            Self::AuthorizationDenied { .. } => 403,
            Self::ResourceNotFound { .. } => 404,
            Self::IllegalStateTransition { .. } | Self::Conflict(_) => 409,
            Self::Storage(_) => 500,
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure of a single bus subscriber. Logged by the bus, never returned from
/// `publish`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberError {
    #[error("subscriber {subscriber} failed: {reason}")]
    Failed { subscriber: String, reason: String },

    #[error("subscriber {subscriber} panicked: {message}")]
    Panicked { subscriber: String, message: String },
}

impl SubscriberError {
    pub fn failed(subscriber: impl Into<String>, reason: impl ToString) -> Self {
        Self::Failed {
            subscriber: subscriber.into(),
            reason: reason.to_string(),
        }
    }
}
