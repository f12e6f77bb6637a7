//! Error taxonomy for the pond core.

use pond_ledger::LedgerError;
use pond_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum PondError {
    /// Bad input from a member; answered with a reply, nothing mutated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Lost a race or hit an exclusivity rule; never a hard failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A record vanished between read and write.
    #[error("not found: {0}")]
    NotFound(String),

    /// Timeout or unavailability of the backing store.
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl PondError {
    /// Storage failures may succeed if the whole request is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PondError::Storage(_))
    }
}

impl From<StorageError> for PondError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => PondError::NotFound(what),
            StorageError::Conflict(what) => PondError::Conflict(what),
            other => PondError::Storage(other),
        }
    }
}

impl From<LedgerError> for PondError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Storage(inner) => inner.into(),
            other => PondError::Validation(other.to_string()),
        }
    }
}

pub type PondResult<T> = Result<T, PondError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_onto_taxonomy() {
        assert!(matches!(
            PondError::from(StorageError::Conflict("x".into())),
            PondError::Conflict(_)
        ));
        assert!(matches!(
            PondError::from(StorageError::NotFound("x".into())),
            PondError::NotFound(_)
        ));
        let timeout = PondError::from(StorageError::Timeout("slow".into()));
        assert!(timeout.is_retryable());
        assert!(!PondError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn ledger_validation_is_not_retryable() {
        let err = PondError::from(LedgerError::InvalidAmount(-2));
        assert!(matches!(err, PondError::Validation(_)));
    }
}
