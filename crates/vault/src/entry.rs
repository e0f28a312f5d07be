use std::fmt;

use rustvault_core::{
    ContentRef, FileKind, FileNode, FileSize, RecordId, Timestamp, UploadedFile,
};
use rustvault_storage::Sanitize;
use serde::{Deserialize, Serialize};

/// Folder tag carried by entries that appear in the virtual Shared folder.
pub const SHARED_TAG: &str = "Shared";

/// Access level granted to one recipient.
/// 授予收件者的存取權限。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    #[default]
    View,
    Edit,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::View => f.write_str("view"),
            Permission::Edit => f.write_str("edit"),
        }
    }
}

/// Permission assignment to one recipient for one entry.
/// 針對單一條目授予單一收件者的權限。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientGrant {
    pub recipient: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub permission: Permission,
}

impl RecipientGrant {
    /// Identities are compared case-insensitively, so they are stored lowercased.
    pub fn new(
        recipient: impl AsRef<str>,
        display_name: impl Into<String>,
        permission: Permission,
    ) -> Self {
        Self {
            recipient: normalize_identity(recipient.as_ref()),
            display_name: display_name.into(),
            permission,
        }
    }

    pub fn view(recipient: impl AsRef<str>) -> Self {
        Self::new(recipient, String::new(), Permission::View)
    }

    pub fn is_for(&self, identity: &str) -> bool {
        self.recipient == normalize_identity(identity)
    }
}

pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Lifecycle classification of a vault record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    #[default]
    Active,
    Trashed,
}

/// Share password, kept in plain text and compared exactly. Demo-grade only.
/// 分享密碼；以明文保存並精確比對，僅供示範用途。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordSecret(String);

impl PasswordSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn matches(&self, attempt: &str) -> bool {
        self.0 == attempt
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordSecret(***)")
    }
}

/// Flat durable record of a file made shareable, independent of tree position.
/// 與樹位置無關、可分享檔案的持久化紀錄。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: RecordId,
    pub name: String,
    pub size: FileSize,
    #[serde(default)]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<ContentRef>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default)]
    pub password_secret: Option<PasswordSecret>,
    #[serde(default)]
    pub shared_with: Vec<RecipientGrant>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl VaultEntry {
    pub fn last_modified(&self) -> Timestamp {
        self.updated_at.unwrap_or(self.created_at)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_shared_folder_member(&self) -> bool {
        self.is_active() && self.folder.as_deref() == Some(SHARED_TAG)
    }

    pub fn grant_for(&self, identity: &str) -> Option<&RecipientGrant> {
        self.shared_with.iter().find(|grant| grant.is_for(identity))
    }

    /// Read-only tree projection used by the virtual Shared folder.
    /// 供虛擬 Shared 資料夾使用的唯讀樹節點投影。
    pub fn to_file_node(&self) -> FileNode {
        FileNode {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            size: self.size.clone(),
            last_modified: self.last_modified(),
            children: Vec::new(),
            content_ref: self.content_ref.clone(),
            starred: self.starred,
        }
    }

    /// Replaces grants with the union of current and `incoming`; for a
    /// recipient present in both, the incoming grant wins. Blank identities
    /// are dropped.
    pub fn merge_grants(&mut self, incoming: impl IntoIterator<Item = RecipientGrant>) {
        for grant in incoming {
            let grant = RecipientGrant::new(&grant.recipient, grant.display_name, grant.permission);
            if grant.recipient.is_empty() {
                continue;
            }
            match self
                .shared_with
                .iter_mut()
                .find(|existing| existing.recipient == grant.recipient)
            {
                Some(existing) => *existing = grant,
                None => self.shared_with.push(grant),
            }
        }
    }
}

impl Sanitize for VaultEntry {
    fn sanitize(&mut self) {
        self.name = self.name.trim().to_string();
        if self
            .password_secret
            .as_ref()
            .is_some_and(|secret| secret.expose().is_empty())
        {
            self.password_secret = None;
        }
        self.has_password = self.password_secret.is_some();

        // Keep the last grant per non-blank recipient, in first-seen order.
        let grants = std::mem::take(&mut self.shared_with);
        self.merge_grants(grants);
    }
}

/// Input for [`crate::VaultStore::add_entry`].
/// 新增保險庫條目所需的資料。
#[derive(Debug, Clone)]
pub struct VaultEntryDraft {
    pub name: String,
    pub size: FileSize,
    pub kind: Option<FileKind>,
    pub content_ref: Option<ContentRef>,
    pub folder: Option<String>,
}

impl VaultEntryDraft {
    pub fn new(name: impl Into<String>, size: FileSize) -> Self {
        Self {
            name: name.into(),
            size,
            kind: None,
            content_ref: None,
            folder: None,
        }
    }

    pub fn from_upload(upload: &UploadedFile) -> Self {
        Self {
            name: upload.name.clone(),
            size: upload.size.clone(),
            kind: Some(upload.kind),
            content_ref: Some(upload.content.clone()),
            folder: None,
        }
    }

    pub fn with_content(mut self, content_ref: ContentRef) -> Self {
        self.content_ref = Some(content_ref);
        self
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }
}
