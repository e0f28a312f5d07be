use std::collections::BTreeMap;

use rustvault_core::KindFilter;
use rustvault_storage::{Persisted, Sanitize, StorageError, StorageLayout, TableKey};
use rustvault_sync::SyncBus;
use serde::{Deserialize, Serialize};

use crate::listing::SortKey;

const PREFERENCES_VERSION: u32 = 1;

/// View used when callers do not name one.
pub const DEFAULT_VIEW: &str = "my-files";

/// Dropdown choices remembered for one listing view.
/// 單一清單畫面記住的下拉選項。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreference {
    #[serde(default)]
    pub filter: KindFilter,
    #[serde(default)]
    pub sort: SortKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPreferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub views: BTreeMap<String, ViewPreference>,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for ListingPreferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            views: BTreeMap::new(),
        }
    }
}

impl Sanitize for ListingPreferences {
    fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        let views = std::mem::take(&mut self.views);
        self.views = views
            .into_iter()
            .map(|(view, pref)| (view.trim().to_string(), pref))
            .filter(|(view, _)| !view.is_empty())
            .collect();
    }
}

/// Persists listing dropdown choices under `dropdown-preferences`.
/// 以 `dropdown-preferences` 保存清單下拉選項。
#[derive(Debug)]
pub struct ListingPreferencesStore {
    document: Persisted<ListingPreferences>,
}

impl ListingPreferencesStore {
    pub fn open(layout: &StorageLayout, bus: SyncBus) -> Self {
        Self {
            document: Persisted::open(layout, TableKey::DropdownPreferences, bus),
        }
    }

    pub fn preferences(&self) -> &ListingPreferences {
        self.document.get()
    }

    /// Stored choice for `view`, or the defaults (`All`, `Name`).
    pub fn view(&self, view: &str) -> ViewPreference {
        self.preferences()
            .views
            .get(view.trim())
            .copied()
            .unwrap_or_default()
    }

    /// Remembers a choice; unchanged values are not rewritten.
    /// 記住選項；值未變更時不重寫。
    pub fn set_view(&mut self, view: &str, preference: ViewPreference) {
        let view = view.trim();
        if view.is_empty() || self.preferences().views.get(view) == Some(&preference) {
            return;
        }
        let view = view.to_string();
        self.document.update(|prefs| {
            prefs.views.insert(view, preference);
        });
    }

    pub fn reload(&mut self) {
        self.document.reload();
    }

    pub fn take_warning(&mut self) -> Option<StorageError> {
        self.document.take_warning()
    }
}
