use std::fmt;

use rustvault_core::{now, RecordId, Timestamp};
use rustvault_storage::{Persisted, Sanitize, StorageError, StorageLayout, Table, TableKey};
use rustvault_sync::SyncBus;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Oldest events are dropped beyond this many.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCategory {
    FileShared,
    FileUploaded,
    FileDeleted,
    FileRestored,
    TrashEmptied,
    FileDownloaded,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::FileShared => "file-shared",
            NotificationCategory::FileUploaded => "file-uploaded",
            NotificationCategory::FileDeleted => "file-deleted",
            NotificationCategory::FileRestored => "file-restored",
            NotificationCategory::TrashEmptied => "trash-emptied",
            NotificationCategory::FileDownloaded => "file-downloaded",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event consumed by the notification center.
/// 通知中心所使用的事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: RecordId,
    pub category: NotificationCategory,
    pub title: String,
    pub description: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub read: bool,
}

impl Sanitize for NotificationEvent {}

/// Bounded notification log (`notifications`), oldest first.
/// 有容量上限的通知紀錄（`notifications`）。
#[derive(Debug)]
pub struct NotificationLog {
    table: Table<NotificationEvent>,
    capacity: usize,
}

impl NotificationLog {
    pub fn open(layout: &StorageLayout, bus: SyncBus) -> Self {
        Self::with_capacity(layout, bus, DEFAULT_NOTIFICATION_CAPACITY)
    }

    pub fn with_capacity(layout: &StorageLayout, bus: SyncBus, capacity: usize) -> Self {
        Self {
            table: Persisted::open(layout, TableKey::Notifications, bus),
            capacity: capacity.max(1),
        }
    }

    pub fn events(&self) -> &[NotificationEvent] {
        self.table.get()
    }

    /// Newest first.
    pub fn recent(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.events().iter().rev()
    }

    pub fn unread_count(&self) -> usize {
        self.events().iter().filter(|event| !event.read).count()
    }

    pub fn push(
        &mut self,
        category: NotificationCategory,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> NotificationEvent {
        let event = NotificationEvent {
            id: RecordId::generate(),
            category,
            title: title.into(),
            description: description.into(),
            created_at: now(),
            read: false,
        };
        let capacity = self.capacity;
        self.table.update(|events| {
            events.push(event.clone());
            if events.len() > capacity {
                let overflow = events.len() - capacity;
                events.drain(..overflow);
            }
        });
        event
    }

    pub fn mark_read(&mut self, id: &RecordId) -> Result<(), StoreError> {
        let index = self
            .events()
            .iter()
            .position(|event| &event.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !self.events()[index].read {
            self.table.update(|events| events[index].read = true);
        }
        Ok(())
    }

    /// Marks everything read, returning how many events changed.
    pub fn mark_all_read(&mut self) -> usize {
        let unread = self.unread_count();
        if unread > 0 {
            self.table.update(|events| {
                for event in events.iter_mut() {
                    event.read = true;
                }
            });
        }
        unread
    }

    pub fn clear(&mut self) {
        if !self.events().is_empty() {
            self.table.update(Vec::clear);
        }
    }

    pub fn reload(&mut self) {
        self.table.reload();
    }

    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.table.take_warning()
    }
}
