use thiserror::Error;
use transport::TransportError;

/// Result type alias for reconciliation operations
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

/// Errors that can occur while reconciling a resource against the backend.
///
/// Only `NotFound` is recoverable: callers treat it as "the resource is
/// absent" and drop it from tracked state. Everything else aborts the
/// operation and is surfaced verbatim.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("could not decode response at {path}: {detail}")]
    Decoding { path: String, detail: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{operation} still pending after {waited_secs}s")]
    ConvergenceTimeout { operation: String, waited_secs: u64 },

    #[error("{operation} failed: backend reported {reason}")]
    ConvergenceFailed { operation: String, reason: String },

    #[error("pagination for {operation} did not converge after {pages} pages")]
    PaginationDiverged { operation: String, pages: u32 },

    #[error("field {field} of {resource} cannot be updated in place")]
    RequiresReplacement { resource: String, field: String },

    #[error("precondition for {operation} not met: {detail}")]
    Precondition { operation: String, detail: String },
}

impl ReconcileError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }
}
