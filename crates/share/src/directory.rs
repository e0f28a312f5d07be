use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustvault_vault::{normalize_identity, Permission, RecipientGrant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Someone files can be shared with.
/// 可分享檔案的對象。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub identity: String,
    pub display_name: String,
    #[serde(default)]
    pub initials: String,
}

impl Recipient {
    pub fn new(identity: impl AsRef<str>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let identity = normalize_identity(identity.as_ref());
        let initials = initials(if display_name.trim().is_empty() {
            &identity
        } else {
            &display_name
        });
        Self {
            identity,
            display_name,
            initials,
        }
    }

    pub fn grant(&self, permission: Permission) -> RecipientGrant {
        RecipientGrant::new(&self.identity, self.display_name.clone(), permission)
    }
}

/// Avatar initials: first letter of the first and last word, uppercased.
/// 頭像縮寫：取第一個與最後一個單字的首字母並轉大寫。
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name
        .split(|c: char| c.is_whitespace() || c == '@' || c == '.')
        .filter(|word| !word.is_empty())
        .collect();
    let picked = match words.as_slice() {
        [] => Vec::new(),
        [only] => vec![*only],
        // Mail addresses keep only the local part.
        [first, ..] if name.contains('@') => vec![*first],
        [first, .., last] => vec![*first, *last],
    };
    picked
        .into_iter()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read recipient directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse recipient directory {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Static recipient directory with lookup and prefix search.
/// 靜態收件者名錄，支援查詢與前綴搜尋。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientDirectory {
    recipients: Vec<Recipient>,
}

impl RecipientDirectory {
    pub fn new(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        let mut directory = Self::default();
        for recipient in recipients {
            directory.insert(recipient);
        }
        directory
    }

    /// Loads a JSON array of `{identity, display_name}` objects.
    /// 從 JSON 陣列載入名錄。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: Vec<Recipient> =
            serde_json::from_str(&contents).map_err(|source| DirectoryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(
            raw.into_iter()
                .map(|recipient| Recipient::new(recipient.identity, recipient.display_name)),
        ))
    }

    /// Adds a recipient, replacing an existing one with the same identity.
    pub fn insert(&mut self, recipient: Recipient) {
        match self
            .recipients
            .iter_mut()
            .find(|existing| existing.identity == recipient.identity)
        {
            Some(existing) => *existing = recipient,
            None => self.recipients.push(recipient),
        }
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn lookup(&self, identity: &str) -> Option<&Recipient> {
        let identity = normalize_identity(identity);
        self.recipients
            .iter()
            .find(|recipient| recipient.identity == identity)
    }

    /// Recipients whose identity or any display-name word starts with `prefix`.
    /// 身分或顯示名稱任一單字以前綴開頭的收件者。
    pub fn search<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a Recipient> + 'a {
        let prefix = prefix.trim().to_lowercase();
        self.recipients.iter().filter(move |recipient| {
            recipient.identity.starts_with(&prefix)
                || recipient
                    .display_name
                    .to_lowercase()
                    .split_whitespace()
                    .any(|word| word.starts_with(&prefix))
        })
    }

    /// Grant for `identity`, using the directory's display name when known.
    pub fn grant_for(&self, identity: &str, permission: Permission) -> RecipientGrant {
        match self.lookup(identity) {
            Some(recipient) => recipient.grant(permission),
            None => RecipientGrant::new(identity, String::new(), permission),
        }
    }
}
