//! Password-gated sharing workflow on top of the vault.
//! 建立在保險庫之上、可設定密碼的分享流程。

pub mod directory;
pub mod error;
pub mod gate;
pub mod password;

pub use directory::{initials, DirectoryError, Recipient, RecipientDirectory};
pub use error::ShareError;
pub use gate::{PendingFile, ShareArtifact, ShareReceipt, ShareState, SharingGate};
pub use password::{PasswordPolicy, PasswordRule, WeakPassword, DEFAULT_MIN_LENGTH};
