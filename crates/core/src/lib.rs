//! Shared value types for the RustVault file vault.
//! RustVault 檔案保險庫共用的值型別。

pub mod content;
pub mod error;
pub mod id;
pub mod kind;
pub mod node;
pub mod size;
pub mod upload;

use chrono::{DateTime, Utc};

pub use content::{ContentReadError, ContentRef};
pub use error::{validate_name, Categorized, ErrorCategory, ValidationError};
pub use id::RecordId;
pub use kind::{FileKind, KindFilter, UnknownVariant};
pub use node::FileNode;
pub use size::{FileSize, FileSizeError};
pub use upload::{MemoryUpload, PathUpload, UploadBatch, UploadSource, UploadedFile};

/// Timestamp type used for every persisted record.
pub type Timestamp = DateTime<Utc>;

/// Current wall-clock time in UTC.
pub fn now() -> Timestamp {
    Utc::now()
}
