use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// File size carried as a display string plus the canonical byte count.
/// 以顯示字串與位元組數表示的檔案大小。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileSize {
    display: String,
    bytes: u64,
}

impl FileSize {
    /// Builds a size from an exact byte count, formatting the display string.
    /// 由位元組數建立大小並產生顯示字串。
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            display: format_bytes(bytes),
            bytes,
        }
    }

    /// Parses a display string such as `"1.2 MB"` (1024-based units).
    /// 解析如 `"1.2 MB"` 的顯示字串（以 1024 為進位）。
    pub fn parse(display: &str) -> Result<Self, FileSizeError> {
        let bytes = parse_display(display)?;
        Ok(Self {
            display: display.trim().to_string(),
            bytes,
        })
    }

    pub fn zero() -> Self {
        Self::from_bytes(0)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl FromStr for FileSize {
    type Err = FileSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for FileSize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileSize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .cmp(&other.bytes)
            .then_with(|| self.display.cmp(&other.display))
    }
}

// Older snapshots stored only the display string; bytes are normalized from it.
impl<'de> Deserialize<'de> for FileSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Display(String),
            Bytes(u64),
            Full {
                display: String,
                #[serde(default)]
                bytes: Option<u64>,
            },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Display(display) => FileSize::parse(&display).map_err(serde::de::Error::custom),
            Repr::Bytes(bytes) => Ok(FileSize::from_bytes(bytes)),
            Repr::Full {
                display,
                bytes: Some(bytes),
            } => Ok(FileSize { display, bytes }),
            Repr::Full {
                display,
                bytes: None,
            } => FileSize::parse(&display).map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileSizeError {
    #[error("empty size string")]
    Empty,
    #[error("invalid size number `{0}`")]
    InvalidNumber(String),
    #[error("unknown size unit `{0}`")]
    UnknownUnit(String),
}

fn parse_display(display: &str) -> Result<u64, FileSizeError> {
    let trimmed = display.trim();
    if trimmed.is_empty() {
        return Err(FileSizeError::Empty);
    }
    let split = trimmed
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.' || ch == ','))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let number = number.replace(',', "");
    let value: f64 = number
        .parse()
        .map_err(|_| FileSizeError::InvalidNumber(number.clone()))?;

    let unit = unit.trim().to_ascii_uppercase();
    let exponent = match unit.as_str() {
        "" | "B" | "BYTE" | "BYTES" => 0,
        "K" | "KB" | "KIB" => 1,
        "M" | "MB" | "MIB" => 2,
        "G" | "GB" | "GIB" => 3,
        "T" | "TB" | "TIB" => 4,
        _ => return Err(FileSizeError::UnknownUnit(unit)),
    };
    Ok((value * 1024f64.powi(exponent)).round() as u64)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
