//! Change signalling between independently persisted tables.
//! 在各自持久化的資料表之間傳遞變更訊號。

pub mod bus;
pub mod watcher;

pub use bus::{fingerprint, ChangeSignal, Origin, Subscription, SyncBus, Topic};
pub use watcher::{StorageWatcher, WatchError};
