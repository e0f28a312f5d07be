use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed classification of tree nodes and vault entries.
/// 樹節點與保險庫條目的封閉式分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Folder,
    Document,
    Spreadsheet,
    Presentation,
    Video,
    Image,
    Audio,
    Pdf,
    Archive,
    #[default]
    Unknown,
}

impl FileKind {
    /// Classifies a file by MIME type first, then by extension.
    /// 先依 MIME 類型、再依副檔名分類檔案。
    pub fn classify(name: &str, mime: Option<&str>) -> Self {
        if let Some(kind) = mime.and_then(Self::from_mime) {
            return kind;
        }
        extension_of(name)
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or(FileKind::Unknown)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let (top, sub) = mime.split_once('/')?;
        let kind = match (top, sub) {
            ("video", _) => FileKind::Video,
            ("image", _) => FileKind::Image,
            ("audio", _) => FileKind::Audio,
            ("application", "pdf") => FileKind::Pdf,
            ("application", "zip")
            | ("application", "gzip")
            | ("application", "x-tar")
            | ("application", "x-7z-compressed")
            | ("application", "x-rar-compressed")
            | ("application", "vnd.rar") => FileKind::Archive,
            ("application", "msword")
            | ("application", "rtf")
            | ("application", "vnd.oasis.opendocument.text")
            | ("application", "vnd.openxmlformats-officedocument.wordprocessingml.document")
            | ("text", _) => FileKind::Document,
            ("application", "vnd.ms-excel")
            | ("application", "vnd.openxmlformats-officedocument.spreadsheetml.sheet") => {
                FileKind::Spreadsheet
            }
            ("application", "vnd.ms-powerpoint")
            | ("application", "vnd.openxmlformats-officedocument.presentationml.presentation") => {
                FileKind::Presentation
            }
            _ => return None,
        };
        Some(kind)
    }

    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "wmv" | "flv" | "m4v" => FileKind::Video,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp" | "heic" | "tiff" => {
                FileKind::Image
            }
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" => FileKind::Audio,
            "pdf" => FileKind::Pdf,
            "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bz2" | "xz" => FileKind::Archive,
            "doc" | "docx" | "txt" | "md" | "rtf" | "odt" | "pages" => FileKind::Document,
            "xls" | "xlsx" | "csv" | "ods" | "numbers" => FileKind::Spreadsheet,
            "ppt" | "pptx" | "odp" | "key" => FileKind::Presentation,
            _ => FileKind::Unknown,
        }
    }

    /// Default MIME type used when packing content for this kind.
    /// 打包內容時此分類的預設 MIME 類型。
    pub fn fallback_mime(self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Document => "text/plain",
            FileKind::Image => "image/*",
            FileKind::Video => "video/*",
            FileKind::Audio => "audio/*",
            FileKind::Archive => "application/zip",
            FileKind::Folder
            | FileKind::Spreadsheet
            | FileKind::Presentation
            | FileKind::Unknown => "application/octet-stream",
        }
    }

    pub fn is_folder(self) -> bool {
        matches!(self, FileKind::Folder)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Folder => "folder",
            FileKind::Document => "document",
            FileKind::Spreadsheet => "spreadsheet",
            FileKind::Presentation => "presentation",
            FileKind::Video => "video",
            FileKind::Image => "image",
            FileKind::Audio => "audio",
            FileKind::Pdf => "pdf",
            FileKind::Archive => "archive",
            FileKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-type filter offered by listings.
/// 清單可用的來源類型篩選。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KindFilter {
    #[default]
    All,
    Folder,
    Document,
    Video,
    Image,
    Pdf,
    Archive,
}

impl KindFilter {
    pub const ALL: [KindFilter; 7] = [
        KindFilter::All,
        KindFilter::Folder,
        KindFilter::Document,
        KindFilter::Video,
        KindFilter::Image,
        KindFilter::Pdf,
        KindFilter::Archive,
    ];

    pub fn matches(self, kind: FileKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Folder => kind == FileKind::Folder,
            // Spreadsheets and slide decks show up under documents.
            KindFilter::Document => matches!(
                kind,
                FileKind::Document | FileKind::Spreadsheet | FileKind::Presentation
            ),
            KindFilter::Video => kind == FileKind::Video,
            KindFilter::Image => kind == FileKind::Image,
            KindFilter::Pdf => kind == FileKind::Pdf,
            KindFilter::Archive => kind == FileKind::Archive,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KindFilter::All => "All",
            KindFilter::Folder => "Folders",
            KindFilter::Document => "Documents",
            KindFilter::Video => "Videos",
            KindFilter::Image => "Images",
            KindFilter::Pdf => "PDFs",
            KindFilter::Archive => "Archives",
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for KindFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let filter = match normalized.as_str() {
            "all" => KindFilter::All,
            "folder" | "folders" => KindFilter::Folder,
            "document" | "documents" | "docs" => KindFilter::Document,
            "video" | "videos" => KindFilter::Video,
            "image" | "images" | "photos" => KindFilter::Image,
            "pdf" | "pdfs" => KindFilter::Pdf,
            "archive" | "archives" => KindFilter::Archive,
            _ => return Err(UnknownVariant(s.to_string())),
        };
        Ok(filter)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown option `{0}`")]
pub struct UnknownVariant(pub String);

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.trim().rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_string())
}
