use std::fmt;

use rustvault_core::{FileSize, RecordId, UploadedFile, ValidationError};
use rustvault_vault::{
    normalize_identity, NotificationCategory, NotificationLog, RecipientGrant, ShareTarget,
    VaultEntry, VaultEntryDraft, VaultStore,
};
use tracing::{debug, info};

use crate::error::ShareError;
use crate::password::PasswordPolicy;

/// Step of one share attempt.
/// 單次分享流程所在的步驟。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShareState {
    #[default]
    Drafting,
    PasswordPending,
    RecipientsPending,
    Shared,
}

impl ShareState {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareState::Drafting => "drafting",
            ShareState::PasswordPending => "password-pending",
            ShareState::RecipientsPending => "recipients-pending",
            ShareState::Shared => "shared",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ShareState::Shared
    }
}

impl fmt::Display for ShareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file queued for sharing: a fresh upload or an entry already in the vault.
/// 等待分享的檔案：新上傳的檔案或保險庫中既有的條目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingFile {
    Upload(UploadedFile),
    Existing {
        id: RecordId,
        name: String,
        size: FileSize,
    },
}

impl PendingFile {
    pub fn existing(entry: &VaultEntry) -> Self {
        PendingFile::Existing {
            id: entry.id.clone(),
            name: entry.name.clone(),
            size: entry.size.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PendingFile::Upload(file) => &file.name,
            PendingFile::Existing { name, .. } => name,
        }
    }

    pub fn size(&self) -> &FileSize {
        match self {
            PendingFile::Upload(file) => &file.size,
            PendingFile::Existing { size, .. } => size,
        }
    }

    fn same_file(&self, other: &PendingFile) -> bool {
        self.name() == other.name() && self.size().bytes() == other.size().bytes()
    }
}

impl From<UploadedFile> for PendingFile {
    fn from(file: UploadedFile) -> Self {
        PendingFile::Upload(file)
    }
}

/// What a copy-link collaborator needs for one shared file.
/// 複製連結時所需的單一檔案分享資訊。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareArtifact {
    pub entry_id: RecordId,
    pub display_name: String,
    pub password_protected: bool,
}

/// Outcome of a completed share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareReceipt {
    pub artifacts: Vec<ShareArtifact>,
    pub recipients: Vec<RecipientGrant>,
}

/// Two-step share workflow: optional password, then recipients.
/// 兩步驟分享流程：可選的密碼，接著選擇收件者。
///
/// The gate owns no persisted data; it writes finished shares into the
/// vault and records one `file-shared` notification per share.
#[derive(Debug, Default)]
pub struct SharingGate {
    state: ShareState,
    policy: PasswordPolicy,
    files: Vec<PendingFile>,
    secret: Option<String>,
    recipients: Vec<RecipientGrant>,
}

impl SharingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: PasswordPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn state(&self) -> ShareState {
        self.state
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn recipients(&self) -> &[RecipientGrant] {
        &self.recipients
    }

    pub fn has_password(&self) -> bool {
        self.secret.is_some()
    }

    /// Queues files, skipping any already pending with the same name and size.
    /// Returns how many were actually added.
    /// 加入待分享檔案；名稱與大小相同者略過。回傳實際加入的數量。
    pub fn add_files<I, F>(&mut self, files: I) -> Result<usize, ShareError>
    where
        I: IntoIterator<Item = F>,
        F: Into<PendingFile>,
    {
        self.expect_state(ShareState::Drafting, "add files")?;
        let mut added = 0;
        for file in files {
            let file = file.into();
            if self.files.iter().any(|pending| pending.same_file(&file)) {
                debug!(name = %file.name(), "duplicate file ignored");
                continue;
            }
            self.files.push(file);
            added += 1;
        }
        Ok(added)
    }

    pub fn request_password(&mut self) -> Result<(), ShareError> {
        self.expect_state(ShareState::Drafting, "request a password")?;
        self.state = ShareState::PasswordPending;
        Ok(())
    }

    /// Accepts a password meeting the policy; a weak one leaves the state as is.
    /// 接受符合規則的密碼；不符合時維持原狀態。
    pub fn submit_password(&mut self, password: &str) -> Result<(), ShareError> {
        self.expect_state(ShareState::PasswordPending, "submit a password")?;
        self.policy.check(password)?;
        self.secret = Some(password.to_string());
        self.state = ShareState::RecipientsPending;
        Ok(())
    }

    pub fn skip_password(&mut self) -> Result<(), ShareError> {
        self.expect_state(ShareState::PasswordPending, "skip the password")?;
        self.secret = None;
        self.state = ShareState::Drafting;
        Ok(())
    }

    /// Selects a recipient; selecting the same identity again replaces the grant.
    /// 選擇收件者；同一身分再次選擇時取代原授權。
    pub fn select_recipient(&mut self, grant: RecipientGrant) -> Result<(), ShareError> {
        self.expect_open("select recipients")?;
        let grant = RecipientGrant::new(&grant.recipient, grant.display_name, grant.permission);
        if grant.recipient.is_empty() {
            return Err(ValidationError::new("recipient must not be empty").into());
        }
        match self
            .recipients
            .iter_mut()
            .find(|existing| existing.recipient == grant.recipient)
        {
            Some(existing) => *existing = grant,
            None => self.recipients.push(grant),
        }
        Ok(())
    }

    pub fn deselect_recipient(&mut self, identity: &str) -> Result<bool, ShareError> {
        self.expect_open("deselect recipients")?;
        let identity = normalize_identity(identity);
        let before = self.recipients.len();
        self.recipients.retain(|grant| grant.recipient != identity);
        Ok(self.recipients.len() != before)
    }

    /// Completes the share: writes every pending file into the vault with the
    /// accepted password and selected grants, tags it `"Shared"` and records a
    /// single `file-shared` notification.
    /// 完成分享：將待分享檔案連同密碼與收件者寫入保險庫，標記為 `"Shared"`，並發出一則通知。
    ///
    /// All entries land in one vault write. An existing entry's grants are
    /// replaced by the selected recipients, not merged. Nothing is written
    /// when validation fails.
    pub fn confirm_share(
        &mut self,
        vault: &mut VaultStore,
        notifications: &mut NotificationLog,
    ) -> Result<ShareReceipt, ShareError> {
        self.expect_open("share")?;
        if self.recipients.is_empty() {
            return Err(ValidationError::new("no recipients selected").into());
        }
        if self.files.is_empty() {
            return Err(ValidationError::new("no files selected").into());
        }
        let secret = self.secret.as_deref();
        let targets = self
            .files
            .iter()
            .map(|file| match file {
                PendingFile::Upload(upload) => {
                    ShareTarget::New(VaultEntryDraft::from_upload(upload))
                }
                PendingFile::Existing { id, .. } => ShareTarget::Existing(id.clone()),
            })
            .collect();
        let artifacts: Vec<ShareArtifact> = vault
            .apply_share(targets, secret, &self.recipients)?
            .into_iter()
            .map(|entry| ShareArtifact {
                entry_id: entry.id,
                display_name: entry.name,
                password_protected: entry.has_password,
            })
            .collect();

        let description = format!(
            "{} shared with {}",
            plural(artifacts.len(), "file"),
            plural(self.recipients.len(), "recipient")
        );
        notifications.push(NotificationCategory::FileShared, "Files shared", &description);
        info!(
            files = artifacts.len(),
            recipients = self.recipients.len(),
            protected = secret.is_some(),
            "share completed"
        );

        self.state = ShareState::Shared;
        Ok(ShareReceipt {
            artifacts,
            recipients: self.recipients.clone(),
        })
    }

    /// Starts a fresh attempt at `Drafting`, keeping the password policy.
    /// 重新開始新的分享流程。
    pub fn restart(&mut self) {
        *self = Self::with_policy(self.policy);
    }

    fn expect_state(&self, expected: ShareState, action: &'static str) -> Result<(), ShareError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ShareError::invalid(self.state, action))
        }
    }

    fn expect_open(&self, action: &'static str) -> Result<(), ShareError> {
        if self.state.is_terminal() {
            Err(ShareError::invalid(self.state, action))
        } else {
            Ok(())
        }
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
