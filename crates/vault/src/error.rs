use rustvault_core::{Categorized, ErrorCategory, RecordId, ValidationError};
use thiserror::Error;

/// Errors raised by the vault, trash, downloads and notification stores.
/// 保險庫、垃圾桶、下載與通知存放區的錯誤。
///
/// Storage failures are not reported here: stores keep serving in-memory
/// state and expose the failure through `take_warning`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(RecordId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Categorized for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::NotFound(_) => ErrorCategory::NotFound,
            StoreError::Validation(_) => ErrorCategory::Validation,
        }
    }
}
