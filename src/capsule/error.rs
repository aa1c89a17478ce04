// Timecapsule — Capsule error types
//
// None of these messages ever carry a credential or a message body.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CapsuleError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Capsule not found: {0}")]
    NotFound(String),

    #[error("Capsule {id} is not ready to be opened until {open_at}")]
    NotReady { id: String, open_at: DateTime<Utc> },

    #[error("Incorrect credential for capsule {0}")]
    Unauthorized(String),

    #[error("Capsule {0} belongs to a different owner")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CapsuleError {
    /// Stable machine-readable name for this failure, used at the API boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::NotReady { .. } => "not_ready",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether the same call might succeed later without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady { .. } | Self::Storage(_))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
