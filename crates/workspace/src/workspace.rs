use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rustvault_core::{
    ContentReadError, FileNode, KindFilter, RecordId, UploadBatch, UploadSource, ValidationError,
};
use rustvault_share::{PasswordPolicy, RecipientDirectory, ShareReceipt, SharingGate};
use rustvault_storage::{StorageError, StorageLayout, TableKey};
use rustvault_sync::{Origin, StorageWatcher, Subscription, SyncBus, Topic};
use rustvault_tree::{ListingPreferencesStore, SortKey, TreeStore};
use rustvault_vault::{
    DownloadDraft, DownloadEntry, DownloadsStore, NotificationCategory, NotificationLog,
    TrashEntry, TrashStore, TrashedItem, VaultEntry, VaultStore,
};
use tracing::{debug, info};

use crate::config::WorkspaceConfig;
use crate::error::WorkspaceError;

/// Result of an upload into the tree: inserted nodes plus skipped files.
/// 上傳結果：已插入的節點與被略過的檔案。
#[derive(Debug, Default)]
pub struct UploadReport {
    pub nodes: Vec<FileNode>,
    pub failures: Vec<ContentReadError>,
}

/// Where a restored item went back to.
/// 還原項目回到的位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restored {
    Entry(VaultEntry),
    Node { node: FileNode, parent: RecordId },
}

impl Restored {
    pub fn name(&self) -> &str {
        match self {
            Restored::Entry(entry) => &entry.name,
            Restored::Node { node, .. } => &node.name,
        }
    }
}

type StaleTables = Arc<Mutex<BTreeSet<TableKey>>>;

/// Every store of one data directory, constructed once and wired to a
/// shared bus.
/// 單一資料目錄的所有資料表，建立一次並共用同一條匯流排。
///
/// Operations that span stores (delete-to-trash, restore, download, upload)
/// live here so that no caller can leave an item live and trashed at once.
pub struct VaultWorkspace {
    layout: StorageLayout,
    config: WorkspaceConfig,
    bus: SyncBus,
    tree: TreeStore,
    vault: VaultStore,
    trash: TrashStore,
    downloads: DownloadsStore,
    notifications: NotificationLog,
    preferences: ListingPreferencesStore,
    watcher: Option<StorageWatcher>,
    stale: StaleTables,
    _external: Subscription,
}

impl VaultWorkspace {
    /// Opens (creating if needed) the data directory at `root`.
    /// 開啟資料目錄，必要時建立。
    pub fn open(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|source| WorkspaceError::CreateDir {
            path: root.to_path_buf(),
            source,
        })?;
        let layout = StorageLayout::new(root);
        let config = WorkspaceConfig::load(layout.config_path())?;
        let bus = SyncBus::new();

        let stale: StaleTables = Arc::default();
        let pending = Arc::clone(&stale);
        let external = bus.subscribe(Topic::STORAGE_UPDATED, move |signal| {
            if signal.origin != Origin::External {
                return;
            }
            if let Some(key) = signal.key.as_deref().and_then(TableKey::from_key) {
                pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key);
            }
        });

        let workspace = Self {
            tree: TreeStore::open(&layout, bus.clone()),
            vault: VaultStore::open(&layout, bus.clone()),
            trash: TrashStore::open(&layout, bus.clone()),
            downloads: DownloadsStore::open(&layout, bus.clone()),
            notifications: NotificationLog::with_capacity(
                &layout,
                bus.clone(),
                config.notification_capacity,
            ),
            preferences: ListingPreferencesStore::open(&layout, bus.clone()),
            layout,
            config,
            bus,
            watcher: None,
            stale,
            _external: external,
        };
        debug!(root = %root.display(), "workspace opened");
        Ok(workspace)
    }

    /// Starts watching the data directory for writes by other processes.
    /// 開始監看其他行程對資料目錄的寫入。
    pub fn watch(&mut self) -> Result<(), WorkspaceError> {
        if self.watcher.is_none() {
            let keys = TableKey::ALL.into_iter().map(TableKey::as_str);
            self.watcher = Some(StorageWatcher::new(
                self.bus.clone(),
                self.layout.root(),
                keys,
            )?);
        }
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn bus(&self) -> &SyncBus {
        &self.bus
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TreeStore {
        &mut self.tree
    }

    pub fn vault(&self) -> &VaultStore {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut VaultStore {
        &mut self.vault
    }

    pub fn trash(&self) -> &TrashStore {
        &self.trash
    }

    pub fn downloads(&self) -> &DownloadsStore {
        &self.downloads
    }

    pub fn downloads_mut(&mut self) -> &mut DownloadsStore {
        &mut self.downloads
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationLog {
        &mut self.notifications
    }

    pub fn preferences(&self) -> &ListingPreferencesStore {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut ListingPreferencesStore {
        &mut self.preferences
    }

    /// Lists a folder, including the virtual Shared folder at the root.
    /// 列出資料夾內容；根目錄包含虛擬 Shared 資料夾。
    pub fn list(
        &self,
        parent: Option<&RecordId>,
        filter: KindFilter,
        sort: SortKey,
    ) -> Result<Vec<FileNode>, WorkspaceError> {
        Ok(self.tree.list(parent, &self.vault, filter, sort)?)
    }

    /// Reads every source and places the readable ones under `parent`.
    /// Unreadable files are reported and skipped.
    /// 讀取所有來源並放入父資料夾；無法讀取的檔案會被略過並回報。
    pub fn upload<'a, I>(
        &mut self,
        parent: Option<&RecordId>,
        sources: I,
    ) -> Result<UploadReport, WorkspaceError>
    where
        I: IntoIterator<Item = &'a dyn UploadSource>,
    {
        let batch = UploadBatch::read(sources);
        let nodes = self.tree.upload(parent, &batch.files)?;
        if !nodes.is_empty() {
            let description = match nodes.as_slice() {
                [only] => only.name.clone(),
                _ => format!("{} files", nodes.len()),
            };
            self.notifications
                .push(NotificationCategory::FileUploaded, "Upload complete", description);
        }
        Ok(UploadReport {
            nodes,
            failures: batch.failures,
        })
    }

    /// Removes an item from the tree or the vault and archives it in one step.
    /// 將項目自資料夾樹或保險庫移除並一併封存至垃圾桶。
    pub fn delete(&mut self, id: &RecordId) -> Result<TrashEntry, WorkspaceError> {
        let item = if self.tree.find(id).is_some() || id.is_root() || id.is_shared_folder() {
            let detached = self.tree.remove(id)?;
            TrashedItem::node(detached.node, Some(detached.parent))
        } else if self.vault.get(id).is_some() {
            TrashedItem::entry(self.vault.take(id)?)
        } else {
            return Err(WorkspaceError::NotFound(id.clone()));
        };
        let trashed = self.trash.soft_delete(item);
        self.notifications.push(
            NotificationCategory::FileDeleted,
            "Moved to trash",
            trashed.item.name(),
        );
        Ok(trashed)
    }

    /// Restores a trashed item. Vault entries become active again; tree
    /// nodes go back to their original folder, or to the root when that
    /// folder no longer exists.
    /// 還原垃圾桶中的項目：保險庫條目恢復為有效；樹節點回到原資料夾，原資料夾不存在時回到根目錄。
    pub fn restore(&mut self, id: &RecordId) -> Result<Restored, WorkspaceError> {
        let archived = self
            .trash
            .get(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?
            .item
            .clone();
        let restored = match archived {
            TrashedItem::Entry { entry } => Restored::Entry(self.vault.reinstate(entry)),
            TrashedItem::Node { node, parent } => {
                let target = parent
                    .filter(|parent| self.tree.find(parent).is_some_and(FileNode::is_folder))
                    .unwrap_or_else(RecordId::root);
                self.tree.insert(Some(&target), node.clone())?;
                Restored::Node {
                    node,
                    parent: target,
                }
            }
        };
        self.trash.restore(id);
        self.notifications.push(
            NotificationCategory::FileRestored,
            "Restored from trash",
            restored.name(),
        );
        Ok(restored)
    }

    /// Permanently deletes one trashed item; absent ids are a no-op.
    pub fn purge(&mut self, id: &RecordId) -> bool {
        self.trash.purge(id)
    }

    /// Permanently deletes everything in the trash.
    /// 清空垃圾桶。
    pub fn empty_trash(&mut self) -> usize {
        let count = self.trash.purge_all();
        if count > 0 {
            let description = if count == 1 {
                "1 item permanently deleted".to_string()
            } else {
                format!("{count} items permanently deleted")
            };
            self.notifications
                .push(NotificationCategory::TrashEmptied, "Trash emptied", description);
        }
        count
    }

    /// Copies a file from the tree or the vault into the downloads table.
    /// 將資料夾樹或保險庫中的檔案複製到下載資料表。
    pub fn download(&mut self, id: &RecordId) -> Result<DownloadEntry, WorkspaceError> {
        let draft = if let Some(node) = self.tree.find(id) {
            if node.is_folder() {
                return Err(ValidationError::new("folders cannot be downloaded").into());
            }
            DownloadDraft::from(node)
        } else if let Some(entry) = self.vault.get(id) {
            DownloadDraft::from(entry)
        } else {
            return Err(WorkspaceError::NotFound(id.clone()));
        };
        let download = self.downloads.add_download(draft);
        self.notifications.push(
            NotificationCategory::FileDownloaded,
            "Download ready",
            download.name.clone(),
        );
        Ok(download)
    }

    /// A fresh sharing attempt using the configured password policy.
    pub fn sharing_gate(&self) -> SharingGate {
        SharingGate::with_policy(PasswordPolicy {
            min_length: self.config.password_min_length,
        })
    }

    pub fn confirm_share(&mut self, gate: &mut SharingGate) -> Result<ShareReceipt, WorkspaceError> {
        Ok(gate.confirm_share(&mut self.vault, &mut self.notifications)?)
    }

    /// Recipient directory named by the configuration, or an empty one.
    /// 載入設定中指定的收件者名錄；未設定時回傳空名錄。
    pub fn recipients(&self) -> Result<RecipientDirectory, WorkspaceError> {
        match self.config.recipients_path(self.layout.root()) {
            Some(path) => Ok(RecipientDirectory::load(path)?),
            None => Ok(RecipientDirectory::default()),
        }
    }

    /// Re-reads one table from disk.
    pub fn refresh(&mut self, key: TableKey) {
        debug!(table = %key, "refreshing table");
        match key {
            TableKey::VaultEntries => self.vault.reload(),
            TableKey::TrashItems => self.trash.reload(),
            TableKey::Downloads => self.downloads.reload(),
            TableKey::Notifications => self.notifications.reload(),
            TableKey::FolderTreeSnapshot => self.tree.reload(),
            TableKey::DropdownPreferences => self.preferences.reload(),
        }
    }

    pub fn refresh_all(&mut self) {
        for key in TableKey::ALL {
            self.refresh(key);
        }
    }

    /// Dispatches queued external changes and reloads the affected tables.
    /// Returns the tables that were refreshed.
    /// 處理佇列中的外部變更並重新載入受影響的資料表。
    pub fn pump_external(&mut self) -> Vec<TableKey> {
        if let Some(watcher) = &self.watcher {
            watcher.pump();
        }
        self.refresh_stale()
    }

    /// Like [`Self::pump_external`], but waits up to `timeout` for a change.
    pub fn wait_external(&mut self, timeout: Duration) -> Vec<TableKey> {
        if let Some(watcher) = &self.watcher {
            watcher.wait(timeout);
        }
        self.refresh_stale()
    }

    /// Collects pending storage warnings from every table.
    /// 收集所有資料表尚未處理的儲存警告。
    pub fn take_warnings(&mut self) -> Vec<StorageError> {
        [
            self.tree.take_warning(),
            self.vault.take_warning(),
            self.trash.take_warning(),
            self.downloads.take_warning(),
            self.notifications.take_warning(),
            self.preferences.take_warning(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn refresh_stale(&mut self) -> Vec<TableKey> {
        let stale: Vec<TableKey> = std::mem::take(
            &mut *self.stale.lock().unwrap_or_else(PoisonError::into_inner),
        )
        .into_iter()
        .collect();
        for key in &stale {
            self.refresh(*key);
        }
        if !stale.is_empty() {
            info!(tables = stale.len(), "reloaded tables changed by another process");
        }
        stale
    }
}
