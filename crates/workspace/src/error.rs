use std::io;
use std::path::PathBuf;

use rustvault_core::{Categorized, ErrorCategory, RecordId, ValidationError};
use rustvault_share::{DirectoryError, ShareError};
use rustvault_sync::WatchError;
use rustvault_tree::TreeError;
use rustvault_vault::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by cross-store workspace operations.
/// 跨資料表的工作區操作錯誤。
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to prepare data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("item {0} not found")]
    NotFound(RecordId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Share(#[from] ShareError),
}

impl Categorized for WorkspaceError {
    fn category(&self) -> ErrorCategory {
        match self {
            WorkspaceError::CreateDir { .. }
            | WorkspaceError::Config(_)
            | WorkspaceError::Watch(_)
            | WorkspaceError::Directory(_) => ErrorCategory::Storage,
            WorkspaceError::NotFound(_) => ErrorCategory::NotFound,
            WorkspaceError::Validation(_) => ErrorCategory::Validation,
            WorkspaceError::Tree(err) => err.category(),
            WorkspaceError::Store(err) => err.category(),
            WorkspaceError::Share(err) => err.category(),
        }
    }
}
