use std::path::{Path, PathBuf};

use crate::key::TableKey;

const CONFIG_FILE: &str = "config.json";

/// Resolves where each table lives inside the data directory.
/// 決定各資料表在資料目錄中的位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, key: TableKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_str()))
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_paths_use_key_names() {
        let layout = StorageLayout::new("/data");
        assert_eq!(
            layout.table_path(TableKey::TrashItems),
            PathBuf::from("/data/trash-items.json")
        );
        assert_eq!(layout.config_path(), PathBuf::from("/data/config.json"));
    }
}
