use rustvault_core::{
    now, validate_name, Categorized, ErrorCategory, FileNode, RecordId, ValidationError,
};
use rustvault_storage::Sanitize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ROOT_NAME: &str = "My Files";

/// Immutable folder tree; every transformation returns a new image.
/// 不可變的資料夾樹；每次變換都回傳新的樹。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    pub revision: u64,
    pub root: FileNode,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl FileTree {
    /// Constructs a tree holding only the root folder.
    /// 建立僅含根資料夾的空樹。
    pub fn empty() -> Self {
        Self {
            revision: 0,
            root: FileNode::folder_with_id(RecordId::root(), ROOT_NAME),
        }
    }

    pub fn root_id(&self) -> &RecordId {
        &self.root.id
    }

    /// Finds a node by identifier.
    /// 依識別碼尋找節點。
    pub fn find(&self, id: &RecordId) -> Option<&FileNode> {
        find_recursive(&self.root, id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.find(id).is_some()
    }

    /// Root-to-node path, inclusive at both ends.
    /// 從根到節點的路徑（含兩端）。
    pub fn breadcrumbs(&self, id: &RecordId) -> Option<Vec<&FileNode>> {
        let mut path = Vec::new();
        if path_recursive(&self.root, id, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    pub fn parent_of(&self, id: &RecordId) -> Option<&FileNode> {
        let path = self.breadcrumbs(id)?;
        let len = path.len();
        if len < 2 {
            return None;
        }
        Some(path[len - 2])
    }

    /// Appends `node` as the last child of `parent` (the root when `None`).
    /// 將節點加入為父節點的最後一個子節點（`None` 代表根）。
    pub fn insert(
        &self,
        parent: Option<&RecordId>,
        node: FileNode,
    ) -> Result<(Self, TreeDiff), TreeError> {
        let parent_id = parent.cloned().unwrap_or_else(RecordId::root);
        if parent_id.is_shared_folder() {
            return Err(TreeError::ReadOnly(parent_id));
        }
        let mut ids = Vec::new();
        node.walk(&mut |n| ids.push(n.id.clone()));
        if let Some(clash) = ids
            .iter()
            .find(|id| id.is_root() || id.is_shared_folder() || self.contains(id))
        {
            return Err(TreeError::DuplicateId(clash.clone()));
        }

        let mut diff = TreeDiff::default();
        diff.added.push(node.id.clone());
        let mut pending = Some(node);
        let root = replace_recursive(&self.root, &parent_id, &mut |folder| {
            if !folder.is_folder() {
                return Err(TreeError::InvalidParent(folder.id.clone()));
            }
            let mut updated = folder.clone();
            updated.children.extend(pending.take());
            updated.last_modified = now();
            Ok(updated)
        })?
        .ok_or_else(|| TreeError::NotFound(parent_id.clone()))?;
        diff.updated.push(parent_id);
        Ok((self.next(root), diff))
    }

    /// Replaces a node's name in place; nothing else about the node changes.
    /// 就地更換節點名稱，其餘欄位不變。
    pub fn rename(&self, id: &RecordId, new_name: &str) -> Result<(Self, TreeDiff), TreeError> {
        let name = validate_name(new_name)?;
        self.update_node(id, |node| node.name = name)
    }

    pub fn set_starred(&self, id: &RecordId, starred: bool) -> Result<(Self, TreeDiff), TreeError> {
        self.update_node(id, |node| node.starred = starred)
    }

    /// Detaches a node with its whole subtree. Sibling order is preserved.
    /// 移除節點及其整個子樹，保留兄弟節點順序。
    pub fn remove(&self, id: &RecordId) -> Result<(Self, Detached, TreeDiff), TreeError> {
        guard_writable(id)?;
        let (root, detached) =
            remove_recursive(&self.root, id).ok_or_else(|| TreeError::NotFound(id.clone()))?;
        let mut diff = TreeDiff::default();
        detached.node.walk(&mut |n| diff.removed.push(n.id.clone()));
        diff.updated.push(detached.parent.clone());
        Ok((self.next(root), detached, diff))
    }

    fn update_node(
        &self,
        id: &RecordId,
        op: impl FnOnce(&mut FileNode),
    ) -> Result<(Self, TreeDiff), TreeError> {
        guard_writable(id)?;
        let mut op = Some(op);
        let root = replace_recursive(&self.root, id, &mut |node| {
            let mut updated = node.clone();
            if let Some(op) = op.take() {
                op(&mut updated);
            }
            Ok(updated)
        })?
        .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        let diff = TreeDiff {
            updated: vec![id.clone()],
            ..TreeDiff::default()
        };
        Ok((self.next(root), diff))
    }

    fn next(&self, root: FileNode) -> Self {
        Self {
            revision: self.revision.wrapping_add(1),
            root,
        }
    }
}

impl Sanitize for FileTree {
    fn sanitize(&mut self) {
        if !self.root.id.is_root() || !self.root.is_folder() {
            *self = FileTree::empty();
            return;
        }
        strip_leaf_children(&mut self.root);
    }
}

fn strip_leaf_children(node: &mut FileNode) {
    if !node.is_folder() {
        node.children.clear();
        return;
    }
    node.content_ref = None;
    for child in &mut node.children {
        strip_leaf_children(child);
    }
}

fn guard_writable(id: &RecordId) -> Result<(), TreeError> {
    if id.is_root() || id.is_shared_folder() {
        return Err(TreeError::ReadOnly(id.clone()));
    }
    Ok(())
}

/// A subtree removed from the tree together with its former parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    pub node: FileNode,
    pub parent: RecordId,
}

fn find_recursive<'a>(node: &'a FileNode, id: &RecordId) -> Option<&'a FileNode> {
    if &node.id == id {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|child| find_recursive(child, id))
}

fn path_recursive<'a>(node: &'a FileNode, id: &RecordId, path: &mut Vec<&'a FileNode>) -> bool {
    path.push(node);
    if &node.id == id {
        return true;
    }
    for child in &node.children {
        if path_recursive(child, id, path) {
            return true;
        }
    }
    path.pop();
    false
}

// Copies a node without its children; callers rebuild the child list.
fn shallow(node: &FileNode) -> FileNode {
    FileNode {
        id: node.id.clone(),
        name: node.name.clone(),
        kind: node.kind,
        size: node.size.clone(),
        last_modified: node.last_modified,
        children: Vec::new(),
        content_ref: node.content_ref.clone(),
        starred: node.starred,
    }
}

fn replace_recursive(
    current: &FileNode,
    id: &RecordId,
    op: &mut dyn FnMut(&FileNode) -> Result<FileNode, TreeError>,
) -> Result<Option<FileNode>, TreeError> {
    if &current.id == id {
        return op(current).map(Some);
    }
    for (index, child) in current.children.iter().enumerate() {
        if let Some(replacement) = replace_recursive(child, id, op)? {
            let mut updated = shallow(current);
            updated.children = current.children[..index].to_vec();
            updated.children.push(replacement);
            updated
                .children
                .extend_from_slice(&current.children[index + 1..]);
            return Ok(Some(updated));
        }
    }
    Ok(None)
}

fn remove_recursive(current: &FileNode, id: &RecordId) -> Option<(FileNode, Detached)> {
    if let Some(index) = current.children.iter().position(|child| &child.id == id) {
        let mut updated = shallow(current);
        updated.children = current.children[..index].to_vec();
        updated
            .children
            .extend_from_slice(&current.children[index + 1..]);
        updated.last_modified = now();
        let detached = Detached {
            node: current.children[index].clone(),
            parent: current.id.clone(),
        };
        return Some((updated, detached));
    }
    for (index, child) in current.children.iter().enumerate() {
        if let Some((replacement, detached)) = remove_recursive(child, id) {
            let mut updated = shallow(current);
            updated.children = current.children[..index].to_vec();
            updated.children.push(replacement);
            updated
                .children
                .extend_from_slice(&current.children[index + 1..]);
            return Some((updated, detached));
        }
    }
    None
}

/// Captures differences after a tree mutation.
/// 紀錄樹狀結構變動後的差異。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: Vec<RecordId>,
    pub removed: Vec<RecordId>,
    pub updated: Vec<RecordId>,
}

/// Tree-manipulation errors.
/// 資料夾樹操作錯誤類型。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} not found")]
    NotFound(RecordId),
    /// The id resolves, but not to a folder; reported as not found.
    #[error("node {0} is not a folder")]
    InvalidParent(RecordId),
    #[error("node {0} is read-only")]
    ReadOnly(RecordId),
    #[error("node id {0} is already in use")]
    DuplicateId(RecordId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Categorized for TreeError {
    fn category(&self) -> ErrorCategory {
        match self {
            TreeError::NotFound(_) | TreeError::InvalidParent(_) => ErrorCategory::NotFound,
            TreeError::DuplicateId(_) | TreeError::Validation(_) => ErrorCategory::Validation,
            TreeError::ReadOnly(_) => ErrorCategory::InvalidState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustvault_core::{FileKind, FileSize};

    fn file(name: &str, bytes: u64) -> FileNode {
        FileNode::file(
            name,
            FileKind::classify(name, None),
            FileSize::from_bytes(bytes),
            None,
        )
    }

    fn sample() -> (FileTree, RecordId, Vec<RecordId>) {
        let tree = FileTree::empty();
        let docs = FileNode::folder("docs");
        let docs_id = docs.id.clone();
        let (mut tree, _) = tree.insert(None, docs).unwrap();
        let mut ids = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let node = file(name, 1);
            ids.push(node.id.clone());
            tree = tree.insert(Some(&docs_id), node).unwrap().0;
        }
        (tree, docs_id, ids)
    }

    #[test]
    fn insert_creates_new_revision() {
        let tree = FileTree::empty();
        let folder = FileNode::folder("src");
        let folder_id = folder.id.clone();
        let (next, diff) = tree.insert(None, folder).unwrap();
        assert_eq!(next.revision, 1);
        assert_eq!(diff.added, vec![folder_id.clone()]);
        assert_eq!(diff.updated, vec![RecordId::root()]);
        assert_eq!(next.root.children[0].id, folder_id);
        // The original image is untouched.
        assert!(tree.root.children.is_empty());
    }

    #[test]
    fn insert_rejects_bad_parents() {
        let (tree, docs_id, ids) = sample();
        let under_file = tree.insert(Some(&ids[0]), file("x.txt", 1)).unwrap_err();
        assert_eq!(under_file, TreeError::InvalidParent(ids[0].clone()));
        assert_eq!(under_file.category(), ErrorCategory::NotFound);
        let ghost = RecordId::from_string("ghost");
        assert_eq!(
            tree.insert(Some(&ghost), file("x.txt", 1)).unwrap_err(),
            TreeError::NotFound(ghost)
        );
        assert!(matches!(
            tree.insert(Some(&RecordId::shared_folder()), file("x.txt", 1)),
            Err(TreeError::ReadOnly(_))
        ));
        let existing = tree.find(&docs_id).unwrap().clone();
        assert!(matches!(
            tree.insert(None, existing),
            Err(TreeError::DuplicateId(_))
        ));
    }

    #[test]
    fn rename_changes_only_the_name() {
        let (tree, _, ids) = sample();
        let before = tree.find(&ids[1]).unwrap().clone();
        let (renamed, _) = tree.rename(&ids[1], "  beta.txt ").unwrap();
        let after = renamed.find(&ids[1]).unwrap();
        assert_eq!(after.name, "beta.txt");
        assert_eq!(
            FileNode {
                name: before.name.clone(),
                ..after.clone()
            },
            before
        );
    }

    #[test]
    fn rename_rejects_empty_names() {
        let (tree, _, ids) = sample();
        assert!(matches!(
            tree.rename(&ids[0], "   "),
            Err(TreeError::Validation(_))
        ));
        assert!(matches!(
            tree.rename(&RecordId::root(), "home"),
            Err(TreeError::ReadOnly(_))
        ));
    }

    #[test]
    fn remove_preserves_sibling_order() {
        let (tree, docs_id, ids) = sample();
        let (pruned, detached, diff) = tree.remove(&ids[1]).unwrap();
        assert_eq!(detached.parent, docs_id);
        assert_eq!(detached.node.id, ids[1]);
        assert_eq!(diff.removed, vec![ids[1].clone()]);
        let remaining: Vec<_> = pruned
            .find(&docs_id)
            .unwrap()
            .children
            .iter()
            .map(|child| child.id.clone())
            .collect();
        assert_eq!(remaining, vec![ids[0].clone(), ids[2].clone()]);
    }

    #[test]
    fn remove_takes_whole_subtree() {
        let (tree, docs_id, ids) = sample();
        let (pruned, detached, diff) = tree.remove(&docs_id).unwrap();
        assert_eq!(detached.parent, RecordId::root());
        assert_eq!(diff.removed.len(), 4);
        assert!(ids.iter().all(|id| !pruned.contains(id)));
    }

    #[test]
    fn breadcrumbs_follow_the_path() {
        let (tree, docs_id, ids) = sample();
        let crumbs: Vec<_> = tree
            .breadcrumbs(&ids[2])
            .unwrap()
            .into_iter()
            .map(|node| node.id.clone())
            .collect();
        assert_eq!(crumbs, vec![RecordId::root(), docs_id.clone(), ids[2].clone()]);
        assert_eq!(tree.parent_of(&ids[2]).unwrap().id, docs_id);
        assert!(tree.parent_of(&RecordId::root()).is_none());
    }

    #[test]
    fn sanitize_resets_foreign_roots() {
        let mut tree = FileTree {
            revision: 4,
            root: file("oops.txt", 1),
        };
        tree.sanitize();
        assert!(tree.root.id.is_root());
        assert!(tree.root.is_folder());
        assert!(tree.root.children.is_empty());
        assert_eq!(tree.revision, 0);
    }
}
