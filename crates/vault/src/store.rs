use rustvault_core::{now, validate_name, FileKind, RecordId};
use rustvault_storage::{Persisted, StorageError, StorageLayout, Table, TableKey};
use rustvault_sync::SyncBus;
use tracing::debug;

use crate::entry::{
    Lifecycle, PasswordSecret, Permission, RecipientGrant, VaultEntry, VaultEntryDraft,
    SHARED_TAG,
};
use crate::error::StoreError;

/// Durable registry of shareable entries (`vault-entries`).
/// 可分享條目的持久化登錄表（`vault-entries`）。
#[derive(Debug)]
pub struct VaultStore {
    table: Table<VaultEntry>,
}

impl VaultStore {
    pub fn open(layout: &StorageLayout, bus: SyncBus) -> Self {
        Self {
            table: Persisted::open(layout, TableKey::VaultEntries, bus),
        }
    }

    pub fn entries(&self) -> &[VaultEntry] {
        self.table.get()
    }

    pub fn get(&self, id: &RecordId) -> Option<&VaultEntry> {
        self.entries().iter().find(|entry| &entry.id == id)
    }

    /// Lazily yields every entry matching `predicate`; call again to restart.
    /// 依條件逐一列出條目；重新呼叫即可重新開始。
    pub fn query<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a VaultEntry> + 'a
    where
        P: Fn(&VaultEntry) -> bool + 'a,
    {
        self.entries().iter().filter(move |entry| predicate(entry))
    }

    pub fn active(&self) -> impl Iterator<Item = &VaultEntry> + '_ {
        self.query(VaultEntry::is_active)
    }

    /// Registers a new entry with a fresh id and default sharing state.
    /// 以新識別碼與預設分享狀態登錄條目。
    pub fn add_entry(&mut self, draft: VaultEntryDraft) -> Result<VaultEntry, StoreError> {
        let entry = build_entry(draft)?;
        debug!(id = %entry.id, name = %entry.name, "vault entry added");
        self.table.update(|entries| entries.push(entry.clone()));
        Ok(entry)
    }

    /// Publishes every target into the Shared folder with `secret` and
    /// exactly `grants`, in one table write. Existing entries lose any
    /// earlier grants. Nothing is written when a target is invalid.
    /// 以單次寫入將所有目標發布至 Shared 資料夾並套用密碼與收件者；任一目標無效時不寫入。
    pub fn apply_share(
        &mut self,
        targets: Vec<ShareTarget>,
        secret: Option<&str>,
        grants: &[RecipientGrant],
    ) -> Result<Vec<VaultEntry>, StoreError> {
        let secret = secret.filter(|s| !s.is_empty()).map(PasswordSecret::new);
        let stamp = now();
        let mut shared = Vec::with_capacity(targets.len());
        let mut created = 0;
        for target in targets {
            let mut entry = match target {
                ShareTarget::New(draft) => {
                    created += 1;
                    build_entry(draft)?
                }
                ShareTarget::Existing(id) => {
                    let mut entry = self
                        .get(&id)
                        .cloned()
                        .ok_or(StoreError::NotFound(id))?;
                    entry.updated_at = Some(stamp);
                    entry
                }
            };
            entry.folder = Some(SHARED_TAG.to_string());
            entry.has_password = secret.is_some();
            entry.password_secret = secret.clone();
            entry.shared_with.clear();
            entry.merge_grants(grants.iter().cloned());
            shared.push(entry);
        }

        debug!(entries = shared.len(), created, "vault entries shared");
        let written = shared.clone();
        self.table.update(|entries| {
            for entry in shared {
                match entries.iter_mut().find(|existing| existing.id == entry.id) {
                    Some(existing) => *existing = entry,
                    None => entries.push(entry),
                }
            }
        });
        Ok(written)
    }

    pub fn rename(&mut self, id: &RecordId, name: &str) -> Result<VaultEntry, StoreError> {
        let name = validate_name(name)?;
        self.modify(id, |entry| entry.name = name)
    }

    pub fn set_starred(&mut self, id: &RecordId, starred: bool) -> Result<VaultEntry, StoreError> {
        self.modify(id, |entry| entry.starred = starred)
    }

    pub fn set_folder(
        &mut self,
        id: &RecordId,
        folder: Option<String>,
    ) -> Result<VaultEntry, StoreError> {
        self.modify(id, |entry| entry.folder = folder)
    }

    /// Sets or clears the share password. Strength is not checked here.
    /// 設定或清除分享密碼；此處不檢查強度。
    pub fn set_password(
        &mut self,
        id: &RecordId,
        secret: Option<&str>,
    ) -> Result<VaultEntry, StoreError> {
        let secret = secret.filter(|s| !s.is_empty()).map(PasswordSecret::new);
        self.modify(id, |entry| {
            entry.has_password = secret.is_some();
            entry.password_secret = secret;
        })
    }

    /// Exact, case-sensitive comparison; always `true` for unprotected entries.
    /// 精確且區分大小寫的比對；未設密碼的條目一律回傳 `true`。
    pub fn verify_password(&self, id: &RecordId, attempt: &str) -> Result<bool, StoreError> {
        let entry = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !entry.has_password {
            return Ok(true);
        }
        Ok(entry
            .password_secret
            .as_ref()
            .is_some_and(|secret| secret.matches(attempt)))
    }

    /// Merges `recipients` into the entry's grants, last write wins per recipient.
    pub fn grant_access(
        &mut self,
        id: &RecordId,
        recipients: impl IntoIterator<Item = RecipientGrant>,
    ) -> Result<VaultEntry, StoreError> {
        let recipients: Vec<RecipientGrant> = recipients.into_iter().collect();
        self.modify(id, |entry| entry.merge_grants(recipients))
    }

    pub fn set_permission(
        &mut self,
        id: &RecordId,
        recipient: &str,
        permission: Permission,
    ) -> Result<VaultEntry, StoreError> {
        let entry = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if entry.grant_for(recipient).is_none() {
            return Err(StoreError::NotFound(RecordId::from_string(recipient)));
        }
        self.modify(id, |entry| {
            if let Some(grant) = entry
                .shared_with
                .iter_mut()
                .find(|grant| grant.is_for(recipient))
            {
                grant.permission = permission;
            }
        })
    }

    /// Removes a recipient's grant; revoking an absent recipient is a no-op.
    pub fn revoke_access(&mut self, id: &RecordId, recipient: &str) -> Result<bool, StoreError> {
        let entry = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if entry.grant_for(recipient).is_none() {
            return Ok(false);
        }
        self.modify(id, |entry| {
            entry.shared_with.retain(|grant| !grant.is_for(recipient))
        })?;
        Ok(true)
    }

    /// Detaches an entry from the table and hands it back.
    /// 自資料表移除條目並回傳。
    pub fn take(&mut self, id: &RecordId) -> Result<VaultEntry, StoreError> {
        let index = self
            .entries()
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(self.table.update(|entries| entries.remove(index)))
    }

    /// Puts a previously taken entry back as active, replacing any record
    /// that reused its id in the meantime.
    pub fn reinstate(&mut self, mut entry: VaultEntry) -> VaultEntry {
        entry.lifecycle = Lifecycle::Active;
        entry.updated_at = Some(now());
        let restored = entry.clone();
        self.table.update(|entries| {
            entries.retain(|existing| existing.id != entry.id);
            entries.push(entry);
        });
        restored
    }

    pub fn reload(&mut self) {
        self.table.reload();
    }

    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.table.take_warning()
    }

    fn modify(
        &mut self,
        id: &RecordId,
        op: impl FnOnce(&mut VaultEntry),
    ) -> Result<VaultEntry, StoreError> {
        let index = self
            .entries()
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(self.table.update(|entries| {
            let entry = &mut entries[index];
            op(entry);
            entry.updated_at = Some(now());
            entry.clone()
        }))
    }
}

fn build_entry(draft: VaultEntryDraft) -> Result<VaultEntry, StoreError> {
    let name = validate_name(&draft.name)?;
    let kind = draft
        .kind
        .unwrap_or_else(|| FileKind::classify(&name, None));
    Ok(VaultEntry {
        id: RecordId::generate(),
        name,
        size: draft.size,
        kind,
        content_ref: draft.content_ref,
        created_at: now(),
        updated_at: None,
        folder: draft.folder,
        starred: false,
        has_password: false,
        password_secret: None,
        shared_with: Vec::new(),
        lifecycle: Lifecycle::Active,
    })
}

/// One file published by [`VaultStore::apply_share`].
/// 分享時要發布的單一檔案。
#[derive(Debug, Clone)]
pub enum ShareTarget {
    New(VaultEntryDraft),
    Existing(RecordId),
}
