use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

const ROOT_ID: &str = "root";
const SHARED_FOLDER_ID: &str = "shared";

/// Stable identifier shared by tree nodes, vault entries and side tables.
/// 樹節點、保險庫條目與其他資料表共用的穩定識別碼。
///
/// Generated identifiers combine a nanosecond timestamp with a random tie
/// breaker, so two ids minted in the same instant still differ.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mints a fresh identifier.
    /// 產生新的識別碼。
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tie_breaker: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
        Self(format!("{nanos:x}-{tie_breaker:06x}"))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identifier of the folder-tree root.
    /// 資料夾樹根節點的識別碼。
    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    /// Identifier of the virtual "Shared" folder.
    /// 虛擬「Shared」資料夾的識別碼。
    pub fn shared_folder() -> Self {
        Self(SHARED_FOLDER_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn is_shared_folder(&self) -> bool {
        self.0 == SHARED_FOLDER_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
