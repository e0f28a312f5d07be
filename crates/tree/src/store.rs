use rustvault_core::{validate_name, FileNode, KindFilter, RecordId, UploadedFile};
use rustvault_storage::{Persisted, StorageError, StorageLayout, TableKey};
use rustvault_sync::SyncBus;
use rustvault_vault::{VaultStore, SHARED_TAG};
use tracing::debug;

use crate::listing::{arrange, SortKey};
use crate::tree::{Detached, FileTree, TreeDiff, TreeError};

/// One step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: RecordId,
    pub name: String,
}

/// Persists the folder tree under `folder-tree-snapshot` and swaps in new
/// tree images on every change.
/// 以 `folder-tree-snapshot` 保存資料夾樹，每次變更時換上新的樹。
#[derive(Debug)]
pub struct TreeStore {
    snapshot: Persisted<FileTree>,
}

impl TreeStore {
    pub fn open(layout: &StorageLayout, bus: SyncBus) -> Self {
        Self {
            snapshot: Persisted::open(layout, TableKey::FolderTreeSnapshot, bus),
        }
    }

    /// Current tree image.
    /// 目前的樹狀結構。
    pub fn tree(&self) -> &FileTree {
        self.snapshot.get()
    }

    pub fn find(&self, id: &RecordId) -> Option<&FileNode> {
        self.tree().find(id)
    }

    /// Inserts `node` as the last child of `parent` (root when `None`).
    /// 將節點插入為父節點的最後一個子節點。
    pub fn insert(
        &mut self,
        parent: Option<&RecordId>,
        node: FileNode,
    ) -> Result<TreeDiff, TreeError> {
        let (next, diff) = self.tree().insert(parent, node)?;
        self.swap(next);
        Ok(diff)
    }

    /// Creates an empty folder after validating its name.
    /// 驗證名稱後建立空資料夾。
    pub fn create_folder(
        &mut self,
        parent: Option<&RecordId>,
        name: &str,
    ) -> Result<FileNode, TreeError> {
        let folder = FileNode::folder(validate_name(name)?);
        self.insert(parent, folder.clone())?;
        debug!(id = %folder.id, name = %folder.name, "folder created");
        Ok(folder)
    }

    /// Inserts every uploaded file under `parent` with a single write.
    /// 將所有上傳檔案放入父資料夾，只寫入一次。
    pub fn upload(
        &mut self,
        parent: Option<&RecordId>,
        files: &[UploadedFile],
    ) -> Result<Vec<FileNode>, TreeError> {
        let mut next = self.tree().clone();
        let mut inserted = Vec::with_capacity(files.len());
        for file in files {
            let name = validate_name(&file.name)?;
            let mut node = FileNode::from_upload(file);
            node.name = name;
            next = next.insert(parent, node.clone())?.0;
            inserted.push(node);
        }
        if !inserted.is_empty() {
            debug!(count = inserted.len(), "uploaded into tree");
            self.swap(next);
        }
        Ok(inserted)
    }

    pub fn rename(&mut self, id: &RecordId, new_name: &str) -> Result<TreeDiff, TreeError> {
        let (next, diff) = self.tree().rename(id, new_name)?;
        self.swap(next);
        Ok(diff)
    }

    pub fn set_starred(&mut self, id: &RecordId, starred: bool) -> Result<TreeDiff, TreeError> {
        let (next, diff) = self.tree().set_starred(id, starred)?;
        self.swap(next);
        Ok(diff)
    }

    /// Detaches a node and its subtree; archiving it is up to the caller.
    /// 移除節點與其子樹；是否封存由呼叫端決定。
    pub fn remove(&mut self, id: &RecordId) -> Result<Detached, TreeError> {
        let (next, detached, _) = self.tree().remove(id)?;
        self.swap(next);
        Ok(detached)
    }

    /// Root-to-node trail; the virtual Shared folder hangs off the root.
    /// 從根到節點的導覽路徑；虛擬 Shared 資料夾位於根之下。
    pub fn breadcrumbs(&self, id: &RecordId) -> Result<Vec<Crumb>, TreeError> {
        let tree = self.tree();
        if id.is_shared_folder() {
            return Ok(vec![crumb(&tree.root), Crumb {
                id: RecordId::shared_folder(),
                name: SHARED_TAG.to_string(),
            }]);
        }
        let path = tree
            .breadcrumbs(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        Ok(path.into_iter().map(crumb).collect())
    }

    /// Lists the direct children of `parent` after filtering and sorting.
    /// Listing the root includes the virtual Shared folder.
    /// 列出父資料夾的直接子節點（已篩選、排序）；根目錄包含虛擬 Shared 資料夾。
    pub fn list(
        &self,
        parent: Option<&RecordId>,
        vault: &VaultStore,
        filter: KindFilter,
        sort: SortKey,
    ) -> Result<Vec<FileNode>, TreeError> {
        let root = RecordId::root();
        let parent = parent.unwrap_or(&root);
        if parent.is_shared_folder() {
            let shared = materialize_shared_folder(vault);
            return Ok(arrange(shared.children, filter, sort));
        }
        let folder = self
            .find(parent)
            .ok_or_else(|| TreeError::NotFound(parent.clone()))?;
        if !folder.is_folder() {
            return Err(TreeError::InvalidParent(parent.clone()));
        }
        let mut children = folder.children.clone();
        if parent.is_root() {
            children.push(materialize_shared_folder(vault));
        }
        Ok(arrange(children, filter, sort))
    }

    pub fn reload(&mut self) {
        self.snapshot.reload();
    }

    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.snapshot.take_warning()
    }

    fn swap(&mut self, next: FileTree) {
        self.snapshot.replace(next);
    }
}

fn crumb(node: &FileNode) -> Crumb {
    Crumb {
        id: node.id.clone(),
        name: node.name.clone(),
    }
}

/// Read-only virtual folder projecting active vault entries tagged
/// `"Shared"`. Recomputed on every call and never persisted.
/// 將標記為 `"Shared"` 的有效條目投影成唯讀虛擬資料夾；每次呼叫重新計算，不會保存。
pub fn materialize_shared_folder(vault: &VaultStore) -> FileNode {
    let mut folder = FileNode::folder_with_id(RecordId::shared_folder(), SHARED_TAG);
    folder.children = vault
        .query(|entry| entry.is_shared_folder_member())
        .map(|entry| entry.to_file_node())
        .collect();
    if let Some(latest) = folder.children.iter().map(|child| child.last_modified).max() {
        folder.last_modified = latest;
    }
    folder
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustvault_core::{ContentRef, FileKind, FileSize};
    use rustvault_vault::VaultEntryDraft;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: StorageLayout,
        tree: TreeStore,
        vault: VaultStore,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let bus = SyncBus::new();
        Fixture {
            tree: TreeStore::open(&layout, bus.clone()),
            vault: VaultStore::open(&layout, bus),
            layout,
            _dir: dir,
        }
    }

    fn upload(name: &str, bytes: u64) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            size: FileSize::from_bytes(bytes),
            kind: FileKind::classify(name, None),
            content: ContentRef::from_bytes("application/octet-stream", b"x"),
        }
    }

    #[test]
    fn videos_sorted_by_size() {
        let mut fx = fixture();
        let folder = fx.tree.create_folder(None, "mixed").unwrap();
        fx.tree
            .upload(
                Some(&folder.id),
                &[
                    upload("small.mp4", 10),
                    upload("notes.txt", 9000),
                    upload("b.mov", 500),
                    upload("a.webm", 500),
                    upload("photo.png", 700),
                    upload("huge.mkv", 90_000),
                ],
            )
            .unwrap();

        let listed = fx
            .tree
            .list(Some(&folder.id), &fx.vault, KindFilter::Video, SortKey::Size)
            .unwrap();
        let names: Vec<_> = listed.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["huge.mkv", "a.webm", "b.mov", "small.mp4"]);
    }

    #[test]
    fn root_listing_includes_virtual_shared_folder() {
        let mut fx = fixture();
        fx.tree.create_folder(None, "docs").unwrap();
        let listed = fx
            .tree
            .list(None, &fx.vault, KindFilter::All, SortKey::Name)
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|node| node.id.clone()).collect();
        assert!(ids.contains(&RecordId::shared_folder()));
        // Never part of the persisted tree.
        assert!(fx.tree.find(&RecordId::shared_folder()).is_none());
    }

    #[test]
    fn shared_folder_tracks_vault_changes() {
        let mut fx = fixture();
        let shared = fx
            .vault
            .add_entry(VaultEntryDraft::new("deck.pptx", FileSize::from_bytes(1)).in_folder(SHARED_TAG))
            .unwrap();
        fx.vault
            .add_entry(VaultEntryDraft::new("private.txt", FileSize::from_bytes(1)))
            .unwrap();

        let listed = fx
            .tree
            .list(Some(&RecordId::shared_folder()), &fx.vault, KindFilter::All, SortKey::Name)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, shared.id);

        fx.vault.take(&shared.id).unwrap();
        assert!(materialize_shared_folder(&fx.vault).children.is_empty());
    }

    #[test]
    fn shared_folder_is_read_only() {
        let mut fx = fixture();
        let shared = RecordId::shared_folder();
        assert!(matches!(
            fx.tree.create_folder(Some(&shared), "nope"),
            Err(TreeError::ReadOnly(_))
        ));
        assert!(matches!(
            fx.tree.rename(&shared, "Mine"),
            Err(TreeError::ReadOnly(_))
        ));
    }

    #[test]
    fn tree_persists_across_reopen() {
        let mut fx = fixture();
        let folder = fx.tree.create_folder(None, "keep").unwrap();
        fx.tree.rename(&folder.id, "kept").unwrap();

        let reopened = TreeStore::open(&fx.layout, SyncBus::new());
        assert_eq!(reopened.find(&folder.id).unwrap().name, "kept");
        assert_eq!(reopened.tree().revision, 2);
    }

    #[test]
    fn breadcrumbs_include_root() {
        let mut fx = fixture();
        let outer = fx.tree.create_folder(None, "outer").unwrap();
        let inner = fx.tree.create_folder(Some(&outer.id), "inner").unwrap();
        let names: Vec<_> = fx
            .tree
            .breadcrumbs(&inner.id)
            .unwrap()
            .into_iter()
            .map(|crumb| crumb.name)
            .collect();
        assert_eq!(names, vec!["My Files", "outer", "inner"]);
        assert_eq!(fx.tree.breadcrumbs(&RecordId::shared_folder()).unwrap().len(), 2);
    }

    #[test]
    fn listing_a_file_is_rejected() {
        let mut fx = fixture();
        let inserted = fx.tree.upload(None, &[upload("a.txt", 1)]).unwrap();
        assert!(matches!(
            fx.tree
                .list(Some(&inserted[0].id), &fx.vault, KindFilter::All, SortKey::Name),
            Err(TreeError::InvalidParent(_))
        ));
    }
}
