//! Composition root: one data directory, every store, and the operations
//! that span more than one of them.
//! 組合根：單一資料目錄、所有資料表，以及跨資料表的操作。

pub mod config;
pub mod error;
pub mod workspace;

pub use config::{ConfigError, WorkspaceConfig};
pub use error::WorkspaceError;
pub use workspace::{Restored, UploadReport, VaultWorkspace};
