use std::fmt;

/// Names of the durable tables; each is persisted as `<key>.json`.
/// 持久化資料表的名稱，每個資料表存成 `<key>.json`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKey {
    VaultEntries,
    TrashItems,
    Downloads,
    Notifications,
    FolderTreeSnapshot,
    DropdownPreferences,
}

impl TableKey {
    pub const ALL: [TableKey; 6] = [
        TableKey::VaultEntries,
        TableKey::TrashItems,
        TableKey::Downloads,
        TableKey::Notifications,
        TableKey::FolderTreeSnapshot,
        TableKey::DropdownPreferences,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TableKey::VaultEntries => "vault-entries",
            TableKey::TrashItems => "trash-items",
            TableKey::Downloads => "downloads",
            TableKey::Notifications => "notifications",
            TableKey::FolderTreeSnapshot => "folder-tree-snapshot",
            TableKey::DropdownPreferences => "dropdown-preferences",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == key)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
