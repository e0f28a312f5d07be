use rustvault_core::{now, FileKind, FileNode, FileSize, RecordId, Timestamp};
use rustvault_storage::{Persisted, Sanitize, StorageError, StorageLayout, Table, TableKey};
use rustvault_sync::SyncBus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::{Lifecycle, VaultEntry};

/// Snapshot of whatever was deleted.
/// 被刪除項目的快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum TrashedItem {
    /// A vault entry; its lifecycle is recorded as trashed.
    Entry { entry: VaultEntry },
    /// A tree node (with its subtree) and the folder it was detached from.
    Node {
        node: FileNode,
        #[serde(default)]
        parent: Option<RecordId>,
    },
}

impl TrashedItem {
    pub fn entry(mut entry: VaultEntry) -> Self {
        entry.lifecycle = Lifecycle::Trashed;
        TrashedItem::Entry { entry }
    }

    pub fn node(node: FileNode, parent: Option<RecordId>) -> Self {
        TrashedItem::Node { node, parent }
    }

    pub fn id(&self) -> &RecordId {
        match self {
            TrashedItem::Entry { entry } => &entry.id,
            TrashedItem::Node { node, .. } => &node.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TrashedItem::Entry { entry } => &entry.name,
            TrashedItem::Node { node, .. } => &node.name,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            TrashedItem::Entry { entry } => entry.kind,
            TrashedItem::Node { node, .. } => node.kind,
        }
    }

    pub fn size(&self) -> FileSize {
        match self {
            TrashedItem::Entry { entry } => entry.size.clone(),
            TrashedItem::Node { node, .. } if node.is_folder() => {
                FileSize::from_bytes(node.total_bytes())
            }
            TrashedItem::Node { node, .. } => node.size.clone(),
        }
    }
}

/// A deleted item awaiting restore or purge.
/// 等待還原或永久刪除的項目。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashEntry {
    pub id: RecordId,
    pub item: TrashedItem,
    pub deleted_at: Timestamp,
}

impl Sanitize for TrashEntry {
    fn sanitize(&mut self) {
        if let TrashedItem::Entry { entry } = &mut self.item {
            entry.sanitize();
            entry.lifecycle = Lifecycle::Trashed;
        }
        if &self.id != self.item.id() {
            self.id = self.item.id().clone();
        }
    }
}

/// Soft-delete archive (`trash-items`).
/// 軟刪除封存區（`trash-items`）。
#[derive(Debug)]
pub struct TrashStore {
    table: Table<TrashEntry>,
}

impl TrashStore {
    pub fn open(layout: &StorageLayout, bus: SyncBus) -> Self {
        Self {
            table: Persisted::open(layout, TableKey::TrashItems, bus),
        }
    }

    pub fn entries(&self) -> &[TrashEntry] {
        self.table.get()
    }

    pub fn get(&self, id: &RecordId) -> Option<&TrashEntry> {
        self.entries().iter().find(|entry| &entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Archives a snapshot with `deleted_at = now`. The source table is not
    /// touched; a newer snapshot of the same id replaces the older one.
    /// 以目前時間封存快照；不會修改來源資料表。
    pub fn soft_delete(&mut self, item: TrashedItem) -> TrashEntry {
        let trashed = TrashEntry {
            id: item.id().clone(),
            item,
            deleted_at: now(),
        };
        debug!(id = %trashed.id, name = %trashed.item.name(), "moved to trash");
        self.table.update(|entries| {
            entries.retain(|existing| existing.id != trashed.id);
            entries.push(trashed.clone());
        });
        trashed
    }

    /// Takes an entry out of the trash so the caller can reinsert it.
    /// 從垃圾桶取出項目供呼叫端重新放回。
    pub fn restore(&mut self, id: &RecordId) -> Option<TrashEntry> {
        let index = self.entries().iter().position(|entry| &entry.id == id)?;
        let restored = self.table.update(|entries| entries.remove(index));
        debug!(id = %restored.id, "restored from trash");
        Some(restored)
    }

    /// Irreversibly removes one entry; purging an absent id does nothing.
    pub fn purge(&mut self, id: &RecordId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.table
            .update(|entries| entries.retain(|entry| &entry.id != id));
        debug!(id = %id, "purged from trash");
        true
    }

    /// Empties the trash, returning how many entries were dropped.
    pub fn purge_all(&mut self) -> usize {
        let count = self.len();
        if count == 0 {
            return 0;
        }
        self.table.update(Vec::clear);
        debug!(count, "trash emptied");
        count
    }

    pub fn reload(&mut self) {
        self.table.reload();
    }

    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.table.take_warning()
    }
}
