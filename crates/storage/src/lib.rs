//! Durable JSON tables for the RustVault stores.
//! RustVault 各資料存放區使用的持久化 JSON 資料表。

pub mod key;
pub mod layout;
pub mod persisted;
mod util;

pub use key::TableKey;
pub use layout::StorageLayout;
pub use persisted::{read_document, Persisted, Sanitize, StorageError, Table};
pub use util::write_atomic;

use rustvault_core::{Categorized, ErrorCategory};

impl Categorized for StorageError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}
