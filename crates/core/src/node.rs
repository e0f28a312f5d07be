use serde::{Deserialize, Serialize};

use crate::content::ContentRef;
use crate::id::RecordId;
use crate::kind::FileKind;
use crate::size::FileSize;
use crate::upload::UploadedFile;
use crate::{now, Timestamp};

/// Node of the navigable folder hierarchy: a folder with ordered children,
/// or a leaf file carrying a content reference.
/// 資料夾階層中的節點：含子節點的資料夾，或帶內容參照的檔案。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: RecordId,
    pub name: String,
    pub kind: FileKind,
    #[serde(default)]
    pub size: FileSize,
    pub last_modified: Timestamp,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<ContentRef>,
    #[serde(default)]
    pub starred: bool,
}

impl FileNode {
    pub fn folder(name: impl Into<String>) -> Self {
        Self::folder_with_id(RecordId::generate(), name)
    }

    pub fn folder_with_id(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: FileKind::Folder,
            size: FileSize::zero(),
            last_modified: now(),
            children: Vec::new(),
            content_ref: None,
            starred: false,
        }
    }

    /// Leaf file built from raw parts; a `Folder` kind is downgraded to `Unknown`.
    pub fn file(
        name: impl Into<String>,
        kind: FileKind,
        size: FileSize,
        content_ref: Option<ContentRef>,
    ) -> Self {
        let kind = if kind.is_folder() {
            FileKind::Unknown
        } else {
            kind
        };
        Self {
            id: RecordId::generate(),
            name: name.into(),
            kind,
            size,
            last_modified: now(),
            children: Vec::new(),
            content_ref,
            starred: false,
        }
    }

    pub fn from_upload(upload: &UploadedFile) -> Self {
        Self::file(
            upload.name.clone(),
            upload.kind,
            upload.size.clone(),
            Some(upload.content.clone()),
        )
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Byte count of the node; folders report the sum of their subtree.
    /// 節點位元組數；資料夾為整個子樹的總和。
    pub fn total_bytes(&self) -> u64 {
        if self.is_folder() {
            self.children.iter().map(FileNode::total_bytes).sum()
        } else {
            self.size.bytes()
        }
    }

    /// Visits the node and all of its descendants depth-first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a FileNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_size_sums_subtree() {
        let mut docs = FileNode::folder("docs");
        docs.children.push(FileNode::file(
            "a.txt",
            FileKind::Document,
            FileSize::from_bytes(10),
            None,
        ));
        let mut nested = FileNode::folder("nested");
        nested.children.push(FileNode::file(
            "b.zip",
            FileKind::Archive,
            FileSize::from_bytes(32),
            None,
        ));
        docs.children.push(nested);

        assert_eq!(docs.total_bytes(), 42);
        assert_eq!(docs.descendant_count(), 3);
    }

    #[test]
    fn file_constructor_never_yields_folder() {
        let node = FileNode::file("odd", FileKind::Folder, FileSize::zero(), None);
        assert!(!node.is_folder());
    }
}
