//! crates/learnpath_core/src/error.rs
//!
//! The error type returned by learner actions.

use crate::draft::DraftError;
use crate::ledger::InsufficientBalance;
use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// A token debit below cost. Nothing was changed.
    #[error(transparent)]
    InsufficientBalance(#[from] InsufficientBalance),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// The resource belongs to another learner.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generated content did not have the shape of a course. Nothing was
    /// persisted and no tokens were debited.
    #[error("Malformed upstream content: {0}")]
    MalformedUpstreamContent(#[from] DraftError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The generation collaborator failed to answer.
    #[error("Upstream service failed: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<PortError> for ProgressError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => ProgressError::RecordNotFound(what),
            PortError::Unauthorized => ProgressError::Unauthorized("access denied".to_string()),
            PortError::Conflict(what) => ProgressError::Conflict(what),
            PortError::Unexpected(msg) => ProgressError::Storage(msg),
        }
    }
}

pub type ProgressResult<T> = Result<T, ProgressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_conflicts_stay_conflicts() {
        let e: ProgressError = PortError::Conflict("email taken".to_string()).into();
        assert!(matches!(e, ProgressError::Conflict(ref what) if what == "email taken"));

        let e: ProgressError = PortError::Unexpected("pool timed out".to_string()).into();
        assert!(matches!(e, ProgressError::Storage(_)));
    }
}
