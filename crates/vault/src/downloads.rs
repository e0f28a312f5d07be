use rustvault_core::{now, ContentRef, FileKind, FileNode, FileSize, RecordId, Timestamp};
use rustvault_storage::{Persisted, Sanitize, StorageError, StorageLayout, Table, TableKey};
use rustvault_sync::SyncBus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::VaultEntry;

/// Materialized copy of a file; outlives the entry it was copied from.
/// 檔案的獨立副本；來源刪除後仍保留。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub id: RecordId,
    pub source_id: RecordId,
    pub name: String,
    pub size: FileSize,
    #[serde(default)]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<ContentRef>,
    pub added_at: Timestamp,
}

impl Sanitize for DownloadEntry {}

/// What gets copied into the downloads table.
#[derive(Debug, Clone)]
pub struct DownloadDraft {
    pub source_id: RecordId,
    pub name: String,
    pub size: FileSize,
    pub kind: FileKind,
    pub content_ref: Option<ContentRef>,
}

impl From<&VaultEntry> for DownloadDraft {
    fn from(entry: &VaultEntry) -> Self {
        Self {
            source_id: entry.id.clone(),
            name: entry.name.clone(),
            size: entry.size.clone(),
            kind: entry.kind,
            content_ref: entry.content_ref.clone(),
        }
    }
}

impl From<&FileNode> for DownloadDraft {
    fn from(node: &FileNode) -> Self {
        Self {
            source_id: node.id.clone(),
            name: node.name.clone(),
            size: node.size.clone(),
            kind: node.kind,
            content_ref: node.content_ref.clone(),
        }
    }
}

/// Downloads table (`downloads`).
/// 下載資料表（`downloads`）。
#[derive(Debug)]
pub struct DownloadsStore {
    table: Table<DownloadEntry>,
}

impl DownloadsStore {
    pub fn open(layout: &StorageLayout, bus: SyncBus) -> Self {
        Self {
            table: Persisted::open(layout, TableKey::Downloads, bus),
        }
    }

    pub fn entries(&self) -> &[DownloadEntry] {
        self.table.get()
    }

    pub fn get(&self, id: &RecordId) -> Option<&DownloadEntry> {
        self.entries().iter().find(|entry| &entry.id == id)
    }

    /// Copies the source, content reference included, into the table.
    /// 複製來源（含內容參照）至下載資料表。
    pub fn add_download(&mut self, draft: impl Into<DownloadDraft>) -> DownloadEntry {
        let draft = draft.into();
        let entry = DownloadEntry {
            id: RecordId::generate(),
            source_id: draft.source_id,
            name: draft.name,
            size: draft.size,
            kind: draft.kind,
            content_ref: draft.content_ref,
            added_at: now(),
        };
        debug!(id = %entry.id, source = %entry.source_id, "download recorded");
        self.table.update(|entries| entries.push(entry.clone()));
        entry
    }

    pub fn remove(&mut self, id: &RecordId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.table
            .update(|entries| entries.retain(|entry| &entry.id != id));
        true
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries().len();
        if count > 0 {
            self.table.update(Vec::clear);
        }
        count
    }

    pub fn reload(&mut self) {
        self.table.reload();
    }

    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.table.take_warning()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::VaultEntryDraft;
    use crate::store::VaultStore;
    use tempfile::tempdir;

    #[test]
    fn download_survives_source_deletion() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let bus = SyncBus::new();
        let mut vault = VaultStore::open(&layout, bus.clone());
        let mut downloads = DownloadsStore::open(&layout, bus);

        let content = ContentRef::from_bytes("text/plain", b"payload");
        let entry = vault
            .add_entry(
                VaultEntryDraft::new("a.txt", FileSize::from_bytes(7)).with_content(content.clone()),
            )
            .unwrap();
        let copy = downloads.add_download(&entry);
        vault.take(&entry.id).unwrap();

        let kept = downloads.get(&copy.id).unwrap();
        assert_eq!(kept.source_id, entry.id);
        assert_eq!(kept.content_ref.as_ref(), Some(&content));
        assert_ne!(kept.id, entry.id);
    }

    #[test]
    fn remove_and_clear() {
        let dir = tempdir().unwrap();
        let mut downloads = DownloadsStore::open(&StorageLayout::new(dir.path()), SyncBus::new());
        let node = FileNode::file("a.png", FileKind::Image, FileSize::from_bytes(1), None);
        let first = downloads.add_download(&node);
        downloads.add_download(&node);

        assert!(downloads.remove(&first.id));
        assert!(!downloads.remove(&first.id));
        assert_eq!(downloads.clear(), 1);
        assert_eq!(downloads.clear(), 0);
    }
}
