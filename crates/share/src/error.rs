use rustvault_core::{Categorized, ErrorCategory, ValidationError};
use rustvault_vault::StoreError;
use thiserror::Error;

use crate::gate::ShareState;
use crate::password::WeakPassword;

/// Sharing-gate failures; every one of them leaves the gate usable.
/// 分享流程錯誤；發生後流程仍可繼續使用。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    WeakPassword(#[from] WeakPassword),
    #[error("cannot {action} while {state}")]
    InvalidState {
        state: ShareState,
        action: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ShareError {
    pub(crate) fn invalid(state: ShareState, action: &'static str) -> Self {
        ShareError::InvalidState { state, action }
    }
}

impl Categorized for ShareError {
    fn category(&self) -> ErrorCategory {
        match self {
            ShareError::Validation(_) | ShareError::WeakPassword(_) => ErrorCategory::Validation,
            ShareError::InvalidState { .. } => ErrorCategory::InvalidState,
            ShareError::Store(err) => err.category(),
        }
    }
}
