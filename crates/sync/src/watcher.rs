use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::event::{EventKind, ModifyKind};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bus::{fingerprint, ChangeSignal, SyncBus, Topic};

const TABLE_EXTENSION: &str = "json";

/// 監控資料目錄時可能回傳的錯誤。 / Error type for storage watching.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// 監看資料目錄，將其他行程的寫入轉為匯流排訊號。 / Watches the data directory and turns writes made by other processes into bus signals.
///
/// Filesystem events are queued by the watcher thread and only turned into
/// signals when the owner calls [`StorageWatcher::pump`] or
/// [`StorageWatcher::wait`], so handlers always run on the owner's thread.
/// Several writes between two pumps collapse into one signal per table.
pub struct StorageWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<String>,
    dir: PathBuf,
    keys: BTreeSet<String>,
    bus: SyncBus,
}

impl StorageWatcher {
    /// 開始監看指定目錄中的資料表檔案。 / Starts watching the table files of `keys` inside `dir`.
    pub fn new<I, S>(bus: SyncBus, dir: impl AsRef<Path>, keys: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = dir.as_ref().to_path_buf();
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let watched = keys.clone();
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    for key in map_event(&event, &watched) {
                        let _ = tx.send(key);
                    }
                }
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %dir.display(), tables = keys.len(), "storage watcher started");

        Ok(Self {
            _watcher: watcher,
            rx,
            dir,
            keys,
            bus,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// 處理目前佇列中的事件（非阻塞）。 / Drains queued events without blocking; returns the number of signals emitted.
    pub fn pump(&self) -> usize {
        let mut changed = BTreeSet::new();
        while let Ok(key) = self.rx.try_recv() {
            changed.insert(key);
        }
        self.dispatch(changed)
    }

    /// 在期限內等待並處理事件。 / Waits up to `timeout` for at least one external change and dispatches it.
    pub fn wait(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(key) => {
                    let mut changed = BTreeSet::from([key]);
                    while let Ok(key) = self.rx.try_recv() {
                        changed.insert(key);
                    }
                    let emitted = self.dispatch(changed);
                    if emitted > 0 || Instant::now() >= deadline {
                        return emitted;
                    }
                }
                Err(_) => return 0,
            }
        }
    }

    fn dispatch(&self, changed: BTreeSet<String>) -> usize {
        let mut emitted = 0;
        for key in changed {
            let path = self.dir.join(format!("{key}.{TABLE_EXTENSION}"));
            let current = match fs::read(&path) {
                Ok(bytes) => fingerprint(&bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => fingerprint(&[]),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not inspect changed table");
                    continue;
                }
            };
            if !self.bus.observe(&key, current) {
                debug!(key = %key, "ignoring echo of own write");
                continue;
            }
            self.bus
                .emit_signal(ChangeSignal::external(Topic::STORAGE_UPDATED, Some(&key)));
            emitted += 1;
        }
        emitted
    }
}

fn map_event(event: &notify::Event, keys: &BTreeSet<String>) -> Vec<String> {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    );
    if !relevant {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(TABLE_EXTENSION))
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
        .filter(|stem| keys.contains(*stem))
        .map(str::to_string)
        .collect()
}
