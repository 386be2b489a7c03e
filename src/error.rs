use uuid::Uuid;

use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Everything the tracker can report back to the UI. Validation failures
/// leave the store untouched; storage failures leave it at its last good state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid data: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("no cycle with id {0}")]
    CycleNotFound(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
