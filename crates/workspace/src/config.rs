use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use rustvault_share::DEFAULT_MIN_LENGTH;
use rustvault_storage::write_atomic;
use rustvault_vault::DEFAULT_NOTIFICATION_CAPACITY;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;
const MAX_NOTIFICATION_CAPACITY: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize configuration {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Workspace settings stored as `config.json` in the data directory.
/// 儲存在資料目錄 `config.json` 中的工作區設定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// 通知紀錄保留的最大筆數。 / Oldest notifications beyond this are dropped.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    /// 分享密碼的最小長度。 / Minimum share password length.
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// 收件者名錄檔案（相對於資料目錄）。 / Recipient directory file, relative to the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

fn default_password_min_length() -> usize {
    DEFAULT_MIN_LENGTH
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            password_min_length: DEFAULT_MIN_LENGTH,
            recipients_file: None,
        }
    }
}

impl WorkspaceConfig {
    /// Loads the configuration, returning defaults when the file is absent.
    /// 載入設定；檔案不存在時回傳預設值。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => Self::default(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.sanitize();
        Ok(config)
    }

    /// Saves the configuration atomically.
    /// 以原子方式寫入設定。
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let payload =
            serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        write_atomic(path, &payload).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        if self.notification_capacity == 0 {
            self.notification_capacity = DEFAULT_NOTIFICATION_CAPACITY;
        }
        self.notification_capacity = self.notification_capacity.min(MAX_NOTIFICATION_CAPACITY);
        self.password_min_length = self.password_min_length.clamp(1, 128);
        if self
            .recipients_file
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            self.recipients_file = None;
        }
    }

    /// Resolves the recipient directory path against the data directory.
    pub fn recipients_path(&self, root: &Path) -> Option<PathBuf> {
        self.recipients_file.as_ref().map(|path| root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = WorkspaceConfig::load(dir.path().join("config.json")).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = WorkspaceConfig {
            notification_capacity: 5,
            recipients_file: Some(PathBuf::from("people.json")),
            ..WorkspaceConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.recipients_path(dir.path()),
            Some(dir.path().join("people.json"))
        );
    }

    #[test]
    fn out_of_range_values_are_repaired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"version":0,"notification_capacity":0,"password_min_length":0,"recipients_file":""}"#,
        )
        .unwrap();

        let config = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);
        assert_eq!(config.password_min_length, 1);
        assert!(config.recipients_file.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            WorkspaceConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
