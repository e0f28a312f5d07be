use std::fmt;
use std::io;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Opaque payload reference, stored as a `data:<mime>;base64,<payload>` URL.
/// 以 data URL 形式保存的內容參照。
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!(
            "{DATA_PREFIX}{mime}{BASE64_MARKER}{}",
            BASE64.encode(bytes)
        ))
    }

    /// Wraps an already-encoded reference without validating it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the MIME type recorded in the reference, if well-formed.
    /// 取得參照中記錄的 MIME 類型。
    pub fn mime(&self) -> Option<&str> {
        let rest = self.0.strip_prefix(DATA_PREFIX)?;
        let (mime, _) = rest.split_once(BASE64_MARKER)?;
        Some(mime)
    }

    /// Decodes the payload bytes.
    /// 解碼內容位元組。
    pub fn decode(&self) -> Result<Vec<u8>, ContentReadError> {
        let payload = self
            .0
            .strip_prefix(DATA_PREFIX)
            .and_then(|rest| rest.split_once(BASE64_MARKER))
            .map(|(_, payload)| payload)
            .ok_or(ContentReadError::MalformedReference)?;
        BASE64
            .decode(payload.as_bytes())
            .map_err(|err| ContentReadError::Decode(err.to_string()))
    }
}

// Payloads can be large; only print the header.
impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentRef")
            .field(&self.mime().unwrap_or("?"))
            .field(&self.0.len())
            .finish()
    }
}

/// Failure to read or decode uploaded bytes.
/// 讀取或解碼上傳內容時的錯誤。
#[derive(Debug, Error)]
pub enum ContentReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("upload `{0}` has no usable file name")]
    MissingName(String),
    #[error("content reference is not a base64 data URL")]
    MalformedReference,
    #[error("content payload is not valid base64: {0}")]
    Decode(String),
}
