//! Reading picked or dropped files into in-memory uploads.
//! 將挑選或拖放的檔案讀入記憶體。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::content::{ContentReadError, ContentRef};
use crate::kind::FileKind;
use crate::size::FileSize;

/// Anything the file-picker collaborator can hand over.
/// 檔案挑選元件可提供的上傳來源。
pub trait UploadSource {
    /// Name shown to the user (usually the file name).
    fn name(&self) -> String;

    /// MIME type, when the source knows it.
    fn mime(&self) -> Option<String> {
        None
    }

    fn read_bytes(&self) -> Result<Vec<u8>, ContentReadError>;
}

/// Upload backed by a file on disk.
#[derive(Debug, Clone)]
pub struct PathUpload {
    path: PathBuf,
}

impl PathUpload {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl UploadSource for PathUpload {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn read_bytes(&self) -> Result<Vec<u8>, ContentReadError> {
        fs::read(&self.path).map_err(|source| ContentReadError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Upload whose bytes are already in memory (drag-drop, tests).
#[derive(Debug, Clone)]
pub struct MemoryUpload {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl MemoryUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

impl UploadSource for MemoryUpload {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn mime(&self) -> Option<String> {
        self.mime.clone()
    }

    fn read_bytes(&self) -> Result<Vec<u8>, ContentReadError> {
        Ok(self.bytes.clone())
    }
}

/// A fully read upload, ready to become a tree node or vault entry.
/// 已完整讀取、可轉成樹節點或保險庫條目的上傳檔案。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub size: FileSize,
    pub kind: FileKind,
    pub content: ContentRef,
}

impl UploadedFile {
    pub fn read(source: &dyn UploadSource) -> Result<Self, ContentReadError> {
        let name = source.name();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ContentReadError::MissingName(name));
        }
        let bytes = source.read_bytes()?;
        let mime = source.mime();
        let kind = FileKind::classify(trimmed, mime.as_deref());
        let mime = mime.unwrap_or_else(|| kind.fallback_mime().to_string());
        Ok(Self {
            name: trimmed.to_string(),
            size: FileSize::from_bytes(bytes.len() as u64),
            kind,
            content: ContentRef::from_bytes(&mime, &bytes),
        })
    }
}

/// Result of reading a batch: unreadable files are skipped, not fatal.
/// 批次讀取結果；無法讀取的檔案會被略過。
#[derive(Debug, Default)]
pub struct UploadBatch {
    pub files: Vec<UploadedFile>,
    pub failures: Vec<ContentReadError>,
}

impl UploadBatch {
    pub fn read<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a dyn UploadSource>,
    {
        let mut batch = UploadBatch::default();
        for source in sources {
            match UploadedFile::read(source) {
                Ok(file) => {
                    debug!(name = %file.name, bytes = file.size.bytes(), "upload read");
                    batch.files.push(file);
                }
                Err(err) => {
                    warn!(name = %source.name(), error = %err, "skipping unreadable upload");
                    batch.failures.push(err);
                }
            }
        }
        batch
    }
}
