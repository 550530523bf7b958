//! Error taxonomy shared by every reconciliation path.
//!
//! [`ApiError`] is the single shape all external-service failures are
//! normalized into; [`ReconcileError`] is what one entity's reconciliation
//! step can end with.

use crate::types::TornId;

/// The external service rejected a call, or could not be reached.
///
/// Transport failures and unparsable bodies are folded into
/// [`ApiError::transport`] so downstream code branches on one shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("API error {code}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

impl ApiError {
    /// Remote code for "incorrect id".
    pub const UNKNOWN_ID: i64 = 6;

    /// Synthetic code used for network failures and malformed payloads.
    pub const TRANSPORT: i64 = -1;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Normalized transport failure.
    pub fn transport() -> Self {
        Self::new(Self::TRANSPORT, "service unavailable")
    }

    pub fn is_unknown_id(&self) -> bool {
        self.code == Self::UNKNOWN_ID
    }
}

/// Failure of a single reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("Torn ID {0} is not known")]
    UnknownAccount(TornId),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("identity mismatch: expected {expected}, remote declares {found}")]
    IdentityMismatch { expected: String, found: String },

    #[error("{0} is not officially verified by Torn")]
    NotVerified(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl ReconcileError {
    /// Classify an external error raised while resolving `id`.
    ///
    /// The message is expected to be redacted already.
    pub fn from_api(err: ApiError, id: TornId) -> Self {
        if err.is_unknown_id() {
            Self::UnknownAccount(id)
        } else {
            Self::ExternalService(err.message)
        }
    }

    pub fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::IdentityMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
