use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rustvault_sync::{fingerprint, SyncBus, Topic};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::key::TableKey;
use crate::layout::StorageLayout;
use crate::util::write_atomic;

/// Errors raised while reading or writing a durable table.
/// 讀寫持久化資料表時的錯誤。
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize table {key}: {source}")]
    Serialize {
        key: TableKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Repairs invariants after loading or mutating persisted data.
/// 載入或變更後修復資料的不變條件。
pub trait Sanitize {
    fn sanitize(&mut self) {}
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize(&mut self) {
        for item in self.iter_mut() {
            item.sanitize();
        }
    }
}

/// A value persisted as one JSON document and rewritten whole on every change.
/// 以單一 JSON 文件保存、每次變更整份覆寫的值。
///
/// Reads never fail: a missing file yields the default value and a corrupt
/// one yields the default plus a retained warning. A failed write keeps the
/// in-memory value, logs once and marks the table degraded until the next
/// successful write. Every commit is followed by a `storage-updated` signal.
#[derive(Debug)]
pub struct Persisted<T> {
    key: TableKey,
    path: PathBuf,
    value: T,
    bus: SyncBus,
    degraded: bool,
    warning: Option<StorageError>,
}

/// Ordered collection of records persisted under one key.
pub type Table<R> = Persisted<Vec<R>>;

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Default + Sanitize,
{
    /// Loads the table for `key`, falling back to the default on any read problem.
    /// 載入資料表；讀取失敗時回傳預設值。
    pub fn open(layout: &StorageLayout, key: TableKey, bus: SyncBus) -> Self {
        let path = layout.table_path(key);
        let (value, warning) = match read_document::<T>(&path) {
            Ok(Some(value)) => (value, None),
            Ok(None) => (T::default(), None),
            Err(err) => {
                warn!(table = %key, error = %err, "unreadable table, starting empty");
                (T::default(), Some(err))
            }
        };
        let mut persisted = Self {
            key,
            path,
            value,
            bus,
            degraded: false,
            warning,
        };
        persisted.value.sanitize();
        persisted
    }

    pub fn key(&self) -> TableKey {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn bus(&self) -> &SyncBus {
        &self.bus
    }

    /// Applies `op`, then persists the whole value and signals the change.
    /// 套用變更後整份寫回並發出變更訊號。
    pub fn update<R>(&mut self, op: impl FnOnce(&mut T) -> R) -> R {
        let result = op(&mut self.value);
        self.value.sanitize();
        self.commit();
        result
    }

    /// Replaces the value wholesale, then persists and signals.
    pub fn replace(&mut self, value: T) {
        self.value = value;
        self.value.sanitize();
        self.commit();
    }

    /// Re-reads the table from disk, e.g. after an external change signal.
    /// 重新從磁碟讀取資料表（例如收到外部變更訊號後）。
    ///
    /// While degraded the in-memory value is the only copy of recent writes,
    /// so it is kept and the reload is skipped.
    pub fn reload(&mut self) {
        if self.degraded {
            debug!(table = %self.key, "skipping reload while degraded");
            return;
        }
        match read_document::<T>(&self.path) {
            Ok(value) => {
                self.value = value.unwrap_or_default();
                self.value.sanitize();
            }
            Err(err) => {
                warn!(table = %self.key, error = %err, "unreadable table on reload, clearing");
                self.value = T::default();
                self.warning = Some(err);
            }
        }
    }

    /// Hands out the pending warning (if any) exactly once.
    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.warning.take()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn commit(&mut self) {
        match self.write() {
            Ok(written) => {
                self.bus.record_local_write(self.key.as_str(), written);
                if self.degraded {
                    info!(table = %self.key, "table writes recovered");
                }
                self.degraded = false;
            }
            Err(err) => {
                if !self.degraded {
                    warn!(table = %self.key, error = %err, "write failed, keeping in-memory state");
                    self.warning = Some(err);
                }
                self.degraded = true;
            }
        }
        self.bus
            .emit(Topic::STORAGE_UPDATED, Some(self.key.as_str()));
    }

    fn write(&self) -> Result<u64, StorageError> {
        let payload =
            serde_json::to_vec_pretty(&self.value).map_err(|source| StorageError::Serialize {
                key: self.key,
                source,
            })?;
        write_atomic(&self.path, &payload).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(table = %self.key, bytes = payload.len(), "table written");
        Ok(fingerprint(&payload))
    }
}

/// Reads a JSON document, returning `Ok(None)` when the file is absent.
/// 讀取 JSON 文件；檔案不存在時回傳 `Ok(None)`。
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    match fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(None),
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StorageError::Parse {
                path: path.to_path_buf(),
                source,
            }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
