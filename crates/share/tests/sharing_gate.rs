use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rustvault_core::{
    Categorized, ContentRef, ErrorCategory, FileKind, FileSize, RecordId, UploadedFile,
};
use rustvault_share::{PendingFile, ShareError, ShareState, SharingGate};
use rustvault_storage::{StorageLayout, TableKey};
use rustvault_sync::{SyncBus, Topic};
use rustvault_vault::{
    NotificationCategory, NotificationLog, Permission, RecipientGrant, VaultEntryDraft,
    VaultStore, SHARED_TAG,
};
use tempfile::{tempdir, TempDir};
use tracing_test::traced_test;

struct Stores {
    _dir: TempDir,
    bus: SyncBus,
    vault: VaultStore,
    notifications: NotificationLog,
}

fn stores() -> Stores {
    let dir = tempdir().expect("tempdir");
    let layout = StorageLayout::new(dir.path());
    let bus = SyncBus::new();
    Stores {
        vault: VaultStore::open(&layout, bus.clone()),
        notifications: NotificationLog::open(&layout, bus.clone()),
        bus,
        _dir: dir,
    }
}

fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        size: FileSize::from_bytes(bytes.len() as u64),
        kind: FileKind::classify(name, None),
        content: ContentRef::from_bytes("application/octet-stream", bytes),
    }
}

#[test]
fn zero_recipients_are_rejected_without_side_effects() {
    let mut stores = stores();
    let mut gate = SharingGate::new();
    gate.add_files([upload("a.pdf", b"pdf")]).expect("add");

    let err = gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .unwrap_err();
    assert_eq!(err.to_string(), "no recipients selected");
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(gate.state(), ShareState::Drafting);
    assert!(stores.vault.entries().is_empty());
    assert!(stores.notifications.events().is_empty());
}

#[test]
fn zero_files_are_rejected() {
    let mut stores = stores();
    let mut gate = SharingGate::new();
    gate.select_recipient(RecipientGrant::view("a@x.com"))
        .expect("select");
    let err = gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .unwrap_err();
    assert_eq!(err.to_string(), "no files selected");
    assert_ne!(gate.state(), ShareState::Shared);
}

#[test]
#[traced_test]
fn password_protected_share_writes_entries_and_one_notification() {
    let mut stores = stores();
    let mut gate = SharingGate::new();
    let added = gate
        .add_files([
            upload("report.pdf", b"1234"),
            upload("clip.mp4", b"12"),
            upload("report.pdf", b"5678"),
        ])
        .expect("add");
    assert_eq!(added, 2);

    gate.request_password().expect("request");
    let err = gate.submit_password("weak").unwrap_err();
    assert!(matches!(err, ShareError::WeakPassword(_)));
    assert_eq!(gate.state(), ShareState::PasswordPending);

    gate.submit_password("Aa1!aa").expect("strong password");
    assert_eq!(gate.state(), ShareState::RecipientsPending);
    gate.select_recipient(RecipientGrant::view("a@x.com"))
        .expect("select");
    gate.select_recipient(RecipientGrant::new("b@x.com", "Bea", Permission::View))
        .expect("select");
    gate.select_recipient(RecipientGrant::new("B@x.com", "Bea", Permission::Edit))
        .expect("reselect");

    let receipt = gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .expect("share");
    assert_eq!(gate.state(), ShareState::Shared);
    assert_eq!(receipt.artifacts.len(), 2);
    assert!(receipt.artifacts.iter().all(|a| a.password_protected));

    for artifact in &receipt.artifacts {
        let entry = stores.vault.get(&artifact.entry_id).expect("entry");
        assert_eq!(entry.folder.as_deref(), Some(SHARED_TAG));
        assert_eq!(entry.shared_with.len(), 2);
        assert_eq!(
            entry.grant_for("b@x.com").map(|grant| grant.permission),
            Some(Permission::Edit)
        );
        assert!(stores
            .vault
            .verify_password(&artifact.entry_id, "Aa1!aa")
            .expect("verify"));
    }

    let shared: Vec<_> = stores
        .notifications
        .events()
        .iter()
        .filter(|event| event.category == NotificationCategory::FileShared)
        .collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].description, "2 files shared with 2 recipients");
    assert!(logs_contain("share completed"));
}

#[test]
fn drafting_can_share_directly_and_existing_entries_are_updated() {
    let mut stores = stores();
    let existing = stores
        .vault
        .add_entry(VaultEntryDraft::new("notes.txt", FileSize::from_bytes(3)))
        .expect("seed");
    stores
        .vault
        .set_password(&existing.id, Some("Old1!pw"))
        .expect("password");
    stores
        .vault
        .grant_access(&existing.id, [RecipientGrant::view("old@x.com")])
        .expect("grant");

    let mut gate = SharingGate::new();
    gate.add_files([PendingFile::existing(&existing)])
        .expect("add");
    gate.select_recipient(RecipientGrant::view("c@x.com"))
        .expect("select");
    let receipt = gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .expect("share");

    assert_eq!(receipt.artifacts[0].entry_id, existing.id);
    assert!(!receipt.artifacts[0].password_protected);
    assert_eq!(stores.vault.entries().len(), 1);
    let entry = stores.vault.get(&existing.id).expect("entry");
    assert!(!entry.has_password);
    assert!(entry.is_shared_folder_member());
    let recipients: Vec<_> = entry
        .shared_with
        .iter()
        .map(|grant| grant.recipient.as_str())
        .collect();
    assert_eq!(recipients, vec!["c@x.com"]);
}

#[test]
fn vault_table_is_written_once_per_share() {
    let mut stores = stores();
    let vault_writes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&vault_writes);
    let _subscription = stores.bus.subscribe(Topic::STORAGE_UPDATED, move |signal| {
        if signal.key.as_deref() == Some(TableKey::VaultEntries.as_str()) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let mut gate = SharingGate::new();
    gate.add_files([upload("a.pdf", b"pdf"), upload("b.pdf", b"pdf!")])
        .expect("add");
    gate.request_password().expect("request");
    gate.submit_password("Aa1!aa").expect("password");
    gate.select_recipient(RecipientGrant::view("a@x.com"))
        .expect("select");
    gate.confirm_share(&mut stores.vault, &mut stores.notifications)
        .expect("share");

    assert_eq!(vault_writes.load(Ordering::SeqCst), 1);
    assert!(stores
        .vault
        .entries()
        .iter()
        .all(|entry| entry.has_password && entry.shared_with.len() == 1));
}

#[test]
fn blank_recipient_is_rejected() {
    let mut stores = stores();
    let mut gate = SharingGate::new();
    gate.add_files([upload("a.png", b"png")]).expect("add");

    let err = gate
        .select_recipient(RecipientGrant::view("   "))
        .unwrap_err();
    assert!(matches!(err, ShareError::Validation(_)));
    assert!(gate.recipients().is_empty());

    let err = gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .unwrap_err();
    assert_eq!(err.to_string(), "no recipients selected");
    assert!(stores.vault.entries().is_empty());
}

#[test]
fn stale_existing_entry_is_not_found() {
    let mut stores = stores();
    let mut gate = SharingGate::new();
    gate.add_files([PendingFile::Existing {
        id: RecordId::from_string("gone"),
        name: "gone.txt".into(),
        size: FileSize::zero(),
    }])
    .expect("add");
    gate.select_recipient(RecipientGrant::view("a@x.com"))
        .expect("select");
    let err = gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(stores.notifications.events().is_empty());
}

#[test]
fn skipped_password_returns_to_drafting() {
    let mut gate = SharingGate::new();
    gate.request_password().expect("request");
    gate.skip_password().expect("skip");
    assert_eq!(gate.state(), ShareState::Drafting);
    assert!(!gate.has_password());
}

#[test]
fn shared_is_terminal_until_restart() {
    let mut stores = stores();
    let mut gate = SharingGate::new();
    gate.add_files([upload("a.png", b"png")]).expect("add");
    gate.select_recipient(RecipientGrant::view("a@x.com"))
        .expect("select");
    gate.confirm_share(&mut stores.vault, &mut stores.notifications)
        .expect("share");

    let err = gate.add_files([upload("b.png", b"png")]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidState);
    assert!(gate
        .confirm_share(&mut stores.vault, &mut stores.notifications)
        .is_err());
    assert_eq!(stores.notifications.events().len(), 1);

    gate.restart();
    assert_eq!(gate.state(), ShareState::Drafting);
    assert!(gate.files().is_empty());
    assert!(gate.recipients().is_empty());
}

#[test]
fn deselect_removes_recipient() {
    let mut gate = SharingGate::new();
    gate.select_recipient(RecipientGrant::view("a@x.com"))
        .expect("select");
    assert!(gate.deselect_recipient("A@X.COM").expect("deselect"));
    assert!(!gate.deselect_recipient("a@x.com").expect("deselect"));
    assert!(gate.recipients().is_empty());
}
