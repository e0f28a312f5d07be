use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace};

/// Name of a broadcast channel on the bus.
/// 匯流排上的廣播主題名稱。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// Process-wide "a durable table changed" topic.
    /// 「持久化資料表已變更」的全域主題。
    pub const STORAGE_UPDATED: Topic = Topic(Cow::Borrowed("storage-updated"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A write performed by this process.
    Local,
    /// A change noticed on disk that this process did not write.
    External,
}

/// Payload delivered to subscribers. It names *what* changed, never *how*:
/// receivers re-read the whole table.
/// 傳給訂閱者的訊號；僅標示變更的資料表，接收者須重新讀取完整內容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub topic: Topic,
    pub key: Option<String>,
    pub origin: Origin,
}

impl ChangeSignal {
    pub fn local(topic: Topic, key: Option<&str>) -> Self {
        Self {
            topic,
            key: key.map(str::to_string),
            origin: Origin::Local,
        }
    }

    pub fn external(topic: Topic, key: Option<&str>) -> Self {
        Self {
            topic,
            key: key.map(str::to_string),
            origin: Origin::External,
        }
    }
}

type Handler = Arc<dyn Fn(&ChangeSignal) + Send + Sync>;

struct Registration {
    id: u64,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    handlers: Mutex<Vec<Registration>>,
    // Last content fingerprint known per table key, local or external.
    known: Mutex<HashMap<String, u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process change-notification bus.
/// 行程內的變更通知匯流排。
///
/// `emit` is fire-and-forget: handlers registered for the topic at the time
/// of the call run synchronously, in subscription order, on the emitting
/// thread. There is no retry and no replay for late subscribers.
#[derive(Clone, Default)]
pub struct SyncBus {
    inner: Arc<Inner>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every subsequent emit on `topic`.
    /// 為指定主題註冊處理器，直到訂閱被釋放為止。
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&ChangeSignal) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(topic = %topic, subscription = id, "subscriber registered");
        lock(&self.inner.handlers).push(Registration {
            id,
            topic,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Announces a local write to `key` on `topic`.
    /// Returns the number of handlers invoked.
    pub fn emit(&self, topic: Topic, key: Option<&str>) -> usize {
        self.emit_signal(ChangeSignal::local(topic, key))
    }

    pub fn emit_signal(&self, signal: ChangeSignal) -> usize {
        // Handlers run outside the lock so they may subscribe or emit themselves.
        let targets: Vec<Handler> = lock(&self.inner.handlers)
            .iter()
            .filter(|registration| registration.topic == signal.topic)
            .map(|registration| Arc::clone(&registration.handler))
            .collect();
        for handler in &targets {
            handler(&signal);
        }
        debug!(
            topic = %signal.topic,
            key = signal.key.as_deref().unwrap_or("-"),
            origin = ?signal.origin,
            subscribers = targets.len(),
            "change signal emitted"
        );
        targets.len()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        lock(&self.inner.handlers)
            .iter()
            .filter(|registration| &registration.topic == topic)
            .count()
    }

    /// Remembers the fingerprint of content this process just wrote to `key`.
    /// 記錄本行程剛寫入之內容指紋，用於忽略自身寫入的回音。
    pub fn record_local_write(&self, key: &str, fingerprint: u64) {
        trace!(key, fingerprint, "local write recorded");
        lock(&self.inner.known).insert(key.to_string(), fingerprint);
    }

    /// Records `fingerprint` as the latest content of `key`, returning `true`
    /// when it differs from what was last known (i.e. a genuinely new change).
    pub fn observe(&self, key: &str, fingerprint: u64) -> bool {
        let mut known = lock(&self.inner.known);
        match known.get(key) {
            Some(previous) if *previous == fingerprint => false,
            _ => {
                known.insert(key.to_string(), fingerprint);
                true
            }
        }
    }
}

impl fmt::Debug for SyncBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBus")
            .field("handlers", &lock(&self.inner.handlers).len())
            .finish()
    }
}

/// Handle to a registered handler; dropping it unsubscribes.
/// 訂閱控制代碼；釋放時自動取消訂閱。
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner.handlers).retain(|registration| registration.id != self.id);
            debug!(subscription = self.id, "subscriber removed");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Stable content fingerprint used to recognise echoes of our own writes.
pub fn fingerprint(bytes: &[u8]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::Hasher;

    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    fn counter(bus: &SyncBus, topic: Topic) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        let subscription = bus.subscribe(topic, move |_| {
            handle.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    #[test]
    fn emit_reaches_registered_handlers_synchronously() {
        let bus = SyncBus::new();
        let (count, _subscription) = counter(&bus, Topic::STORAGE_UPDATED);

        let delivered = bus.emit(Topic::STORAGE_UPDATED, Some("downloads"));
        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_only_see_their_topic() {
        let bus = SyncBus::new();
        let (count, _subscription) = counter(&bus, Topic::new("other"));
        assert_eq!(bus.emit(Topic::STORAGE_UPDATED, None), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let bus = SyncBus::new();
        let (count, subscription) = counter(&bus, Topic::STORAGE_UPDATED);
        bus.emit(Topic::STORAGE_UPDATED, None);
        subscription.unsubscribe();
        bus.emit(Topic::STORAGE_UPDATED, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(&Topic::STORAGE_UPDATED), 0);
    }

    #[test]
    fn handlers_may_reenter_the_bus() {
        let bus = SyncBus::new();
        let inner_bus = bus.clone();
        let (count, _counter) = counter(&bus, Topic::new("second"));
        let _relay = bus.subscribe(Topic::STORAGE_UPDATED, move |_| {
            inner_bus.emit(Topic::new("second"), None);
        });
        bus.emit(Topic::STORAGE_UPDATED, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observe_ignores_known_fingerprints() {
        let bus = SyncBus::new();
        let written = fingerprint(b"[1,2,3]");
        bus.record_local_write("downloads", written);
        assert!(!bus.observe("downloads", written));
        assert!(bus.observe("downloads", fingerprint(b"[1,2]")));
        assert!(!bus.observe("downloads", fingerprint(b"[1,2]")));
    }

    #[traced_test]
    #[test]
    fn emit_is_logged() {
        let bus = SyncBus::new();
        bus.emit(Topic::STORAGE_UPDATED, Some("trash-items"));
        assert!(logs_contain("change signal emitted"));
    }
}
