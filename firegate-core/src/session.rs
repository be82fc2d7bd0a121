//! The owned enable/disable lifecycle.
//!
//! Everything a running installation holds — the policy store, the file
//! watcher, and the hooked entry points — lives inside one [`Session`].
//! Disabling (or dropping) the session restores every hook and releases
//! every subscription deterministically, on the error path as well as the
//! normal one.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use firegate_config::{loader, PolicyStore, PolicyWatcher};

use crate::interceptor::{LaunchEntryPoint, LaunchInterceptor};
use crate::spawn::{ProcessSpawner, SystemSpawner};

/// A running Firegate installation.
pub struct Session {
    store: Arc<PolicyStore>,
    interceptor: Arc<LaunchInterceptor>,
    watcher: Option<PolicyWatcher>,
}

impl Session {
    /// Enable with the default policy location and the system spawner.
    ///
    /// The policy file is loaded from `FIREGATE_CONFIG_PATH` or
    /// `~/.firegate/firegate.toml`; if it cannot be read the fixed default
    /// policy applies (enabled, basic level, no overrides).
    pub fn enable(entry_points: Vec<Arc<dyn LaunchEntryPoint>>) -> Result<Self> {
        let path = loader::resolve_config_path()?;
        let settings = loader::load_or_default(&path);
        let store = Arc::new(PolicyStore::with_backing(settings, path));
        Self::enable_with(store, Arc::new(SystemSpawner::new()), entry_points)
    }

    /// Enable against an explicit store and spawner.
    pub fn enable_with(
        store: Arc<PolicyStore>,
        spawner: Arc<dyn ProcessSpawner>,
        entry_points: Vec<Arc<dyn LaunchEntryPoint>>,
    ) -> Result<Self> {
        info!("enabling launch interception");

        let interceptor = Arc::new(LaunchInterceptor::new(Arc::clone(&store), spawner));
        for entry_point in entry_points {
            if let Err(error) = interceptor.install(entry_point) {
                interceptor.restore_all();
                return Err(error).context("failed to hook a launch entry point");
            }
        }

        // File watching is an enhancement; a session without it still works,
        // it just won't pick up external edits until re-enabled.
        let watcher = match store.backing_path() {
            Some(path) => match PolicyWatcher::spawn(Arc::clone(&store), path.clone()) {
                Ok(watcher) => Some(watcher),
                Err(error) => {
                    warn!(%error, "policy file watching unavailable");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            store,
            interceptor,
            watcher,
        })
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn interceptor(&self) -> &Arc<LaunchInterceptor> {
        &self.interceptor
    }

    /// Whether sandboxing is currently enabled globally. Status indicators
    /// render this; they can subscribe to `PolicyKey::Enabled` on the store
    /// for changes.
    pub fn is_active(&self) -> bool {
        self.store.enabled()
    }

    /// Tear the session down, restoring every hooked entry point.
    pub fn disable(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!("disabling launch interception");
        self.watcher.take();
        self.interceptor.restore_all();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("watching", &self.watcher.is_some())
            .finish_non_exhaustive()
    }
}
