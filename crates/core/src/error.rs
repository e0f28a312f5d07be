use thiserror::Error;

/// Coarse classification every error in the workspace maps onto.
/// 工作區內所有錯誤對應的粗略分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input; surfaced inline and recovered locally.
    Validation,
    /// A stale id; treated as a no-op.
    NotFound,
    /// Durable read/write failure.
    Storage,
    /// Uploaded bytes could not be read or decoded.
    ContentRead,
    /// An operation was attempted from a state that does not allow it.
    InvalidState,
}

pub trait Categorized {
    fn category(&self) -> ErrorCategory;
}

/// Rejected user input.
/// 使用者輸入不合法。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl Categorized for ValidationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

impl Categorized for crate::content::ContentReadError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::ContentRead
    }
}

/// Trims a display name, rejecting names that are empty once trimmed.
/// 修剪名稱；修剪後為空則拒絕。
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("name must not be empty"));
    }
    Ok(trimmed.to_string())
}
