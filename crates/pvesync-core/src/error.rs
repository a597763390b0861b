// ── Reconciliation error taxonomy ──
//
// Errors are classified by how the engine reacts to them, not by where
// they happened: connectivity failures are fatal for the affected
// operation only, validation failures skip a single field or child,
// conflicts get one retry, partial-apply failures keep the pass going.
// Nothing propagates past the batch driver, which reports counts instead.

use thiserror::Error;

/// Unified error type for the reconciliation engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A provider is unreachable; the affected operation is abandoned.
    #[error("provider unreachable: {0}")]
    Connectivity(String),

    /// A single field or child resource failed validation and was skipped.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness constraint was violated on create.
    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    /// An apply call reported failure without a transport error.
    #[error("apply failed: {0}")]
    PartialApply(String),

    /// Passthrough from the API layer, classified via the helpers below.
    #[error(transparent)]
    Api(#[from] pvesync_api::Error),

    /// Invalid reconciliation configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Returns `true` if this error reports a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Api(e) => e.is_conflict(),
            _ => false,
        }
    }

    /// Returns `true` if the underlying provider could not be reached.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connectivity(_) => true,
            Self::Api(e) => e.is_connectivity(),
            _ => false,
        }
    }

    /// Returns `true` for a "not found" API answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_not_found())
    }
}
