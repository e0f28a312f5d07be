//! Flat durable tables of the vault: shareable entries, trash, downloads
//! and notifications.
//! 保險庫的扁平持久化資料表：可分享條目、垃圾桶、下載與通知。

pub mod downloads;
pub mod entry;
pub mod error;
pub mod notifications;
pub mod store;
pub mod trash;

pub use downloads::{DownloadDraft, DownloadEntry, DownloadsStore};
pub use entry::{
    normalize_identity, Lifecycle, PasswordSecret, Permission, RecipientGrant, VaultEntry,
    VaultEntryDraft, SHARED_TAG,
};
pub use error::StoreError;
pub use notifications::{
    NotificationCategory, NotificationEvent, NotificationLog, DEFAULT_NOTIFICATION_CAPACITY,
};
pub use store::{ShareTarget, VaultStore};
pub use trash::{TrashEntry, TrashStore, TrashedItem};
