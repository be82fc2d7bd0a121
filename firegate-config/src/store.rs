//! The process-wide mutable policy store.
//!
//! One [`PolicyStore`] exists per enabled session. Launch interceptions read
//! immutable snapshots; mutations swap in a new snapshot, persist it to the
//! backing file when one is configured, and fire the subscriptions
//! registered for the mutated key. Reads never take a lock.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::loader;
use crate::types::{IsolationLevel, OverrideLevel, PolicyKey, PolicySettings};

type ChangeCallback = Arc<dyn Fn(&PolicySettings) + Send + Sync>;

struct Subscriber {
    id: u64,
    key: PolicyKey,
    callback: ChangeCallback,
}

/// Handle returned by [`PolicyStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Mutable policy state with snapshot reads and per-key change notification.
pub struct PolicyStore {
    current: ArcSwap<PolicySettings>,
    backing_path: Option<PathBuf>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber: AtomicU64,
}

impl PolicyStore {
    /// Create an in-memory store with no backing file.
    pub fn new(settings: PolicySettings) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings),
            backing_path: None,
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
        }
    }

    /// Create a store that writes mutations through to `path`.
    pub fn with_backing(settings: PolicySettings, path: PathBuf) -> Self {
        Self {
            backing_path: Some(path),
            ..Self::new(settings)
        }
    }

    /// The backing file path, if any.
    pub fn backing_path(&self) -> Option<&PathBuf> {
        self.backing_path.as_ref()
    }

    /// A consistent snapshot of the current policy.
    pub fn snapshot(&self) -> Arc<PolicySettings> {
        self.current.load_full()
    }

    pub fn enabled(&self) -> bool {
        self.current.load().enabled
    }

    pub fn default_level(&self) -> IsolationLevel {
        self.current.load().default_level
    }

    pub fn override_for(&self, app_id: &str) -> Option<OverrideLevel> {
        self.current.load().override_for(app_id)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(PolicyKey::Enabled, |settings| settings.enabled = enabled);
    }

    pub fn set_default_level(&self, level: IsolationLevel) {
        self.update(PolicyKey::DefaultLevel, |settings| {
            settings.default_level = level
        });
    }

    /// Set or clear the override for one application id.
    pub fn set_override(&self, app_id: &str, level: Option<OverrideLevel>) {
        self.update(PolicyKey::Overrides, |settings| match level {
            Some(level) => {
                settings.overrides.insert(app_id.to_string(), level);
            }
            None => {
                settings.overrides.shift_remove(app_id);
            }
        });
    }

    /// Replace the entire override map.
    pub fn replace_overrides(&self, overrides: IndexMap<String, OverrideLevel>) {
        self.update(PolicyKey::Overrides, |settings| {
            settings.overrides = overrides
        });
    }

    /// Adopt settings reloaded from the backing file, notifying subscribers
    /// of every key whose value changed. Does not write back to disk.
    pub fn apply_external(&self, next: PolicySettings) {
        let prev = self.current.load_full();
        if *prev == next {
            return;
        }

        let mut changed = Vec::new();
        if prev.enabled != next.enabled {
            changed.push(PolicyKey::Enabled);
        }
        if prev.default_level != next.default_level {
            changed.push(PolicyKey::DefaultLevel);
        }
        if prev.overrides != next.overrides {
            changed.push(PolicyKey::Overrides);
        }

        debug!(?changed, "adopting externally modified policy");
        self.current.store(Arc::new(next));
        for key in changed {
            self.notify(key);
        }
    }

    /// Register a callback fired after the given key changes. The callback
    /// receives the settings snapshot the change produced.
    pub fn subscribe(
        &self,
        key: PolicyKey,
        callback: impl Fn(&PolicySettings) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber {
            id,
            key,
            callback: Arc::new(callback),
        });
        SubscriptionId(id)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|sub| sub.id != id.0);
    }

    fn update(&self, key: PolicyKey, mutate: impl FnOnce(&mut PolicySettings)) {
        let prev = self.current.load_full();
        let mut next = PolicySettings::clone(&prev);
        mutate(&mut next);
        if *prev == next {
            return;
        }

        self.current.store(Arc::new(next));
        self.persist();
        self.notify(key);
    }

    fn persist(&self) {
        let Some(path) = &self.backing_path else {
            return;
        };
        let snapshot = self.current.load_full();
        if let Err(error) = loader::save(&snapshot, path) {
            // Persistence is best-effort; the in-memory policy stays valid.
            warn!(path = %path.display(), %error, "failed to persist policy");
        }
    }

    fn notify(&self, key: PolicyKey) {
        let snapshot = self.current.load_full();
        let callbacks: Vec<ChangeCallback> = self
            .subscribers
            .lock()
            .iter()
            .filter(|sub| sub.key == key)
            .map(|sub| Arc::clone(&sub.callback))
            .collect();
        for callback in callbacks {
            callback(&snapshot);
        }
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("current", &self.current.load())
            .field("backing_path", &self.backing_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn snapshots_are_isolated_from_later_mutations() {
        let store = PolicyStore::new(PolicySettings::default());
        let before = store.snapshot();
        store.set_default_level(IsolationLevel::Paranoid);
        assert_eq!(before.default_level, IsolationLevel::Basic);
        assert_eq!(store.default_level(), IsolationLevel::Paranoid);
    }

    #[test]
    fn subscriptions_fire_for_their_key_only() {
        let store = PolicyStore::new(PolicySettings::default());
        let enabled_calls = Arc::new(AtomicUsize::new(0));
        let override_calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&enabled_calls);
        store.subscribe(PolicyKey::Enabled, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&override_calls);
        store.subscribe(PolicyKey::Overrides, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_enabled(false);
        store.set_override("org.gnome.gedit", Some(OverrideLevel::Bypass));
        store.set_override("org.gnome.gedit", None);

        assert_eq!(enabled_calls.load(Ordering::SeqCst), 1);
        assert_eq!(override_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unchanged_writes_do_not_notify() {
        let store = PolicyStore::new(PolicySettings::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(PolicyKey::Enabled, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_enabled(true); // already the default
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = PolicyStore::new(PolicySettings::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.subscribe(PolicyKey::Enabled, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_enabled(false);
        store.unsubscribe(id);
        store.set_enabled(true);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mutations_write_through_to_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firegate.toml");
        let store = PolicyStore::with_backing(PolicySettings::default(), path.clone());

        store.set_default_level(IsolationLevel::Strict);

        let reloaded = loader::load_or_default(&path);
        assert_eq!(reloaded.default_level, IsolationLevel::Strict);
    }

    #[test]
    fn apply_external_notifies_changed_keys() {
        let store = PolicyStore::new(PolicySettings::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(PolicyKey::DefaultLevel, move |settings| {
            assert_eq!(settings.default_level, IsolationLevel::Paranoid);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let next = PolicySettings {
            default_level: IsolationLevel::Paranoid,
            ..PolicySettings::default()
        };
        store.apply_external(next.clone());
        // Re-applying identical settings is a no-op.
        store.apply_external(next);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
