//! Folder hierarchy: immutable tree transforms, filtered listings and the
//! virtual Shared folder projected from the vault.
//! 資料夾階層：不可變的樹狀變換、篩選清單，以及由保險庫投影的虛擬 Shared 資料夾。

pub mod listing;
pub mod preferences;
pub mod store;
pub mod tree;

pub use listing::{arrange, compare_names, SortKey};
pub use preferences::{ListingPreferences, ListingPreferencesStore, ViewPreference, DEFAULT_VIEW};
pub use store::{materialize_shared_folder, Crumb, TreeStore};
pub use tree::{Detached, FileTree, TreeDiff, TreeError, ROOT_NAME};
