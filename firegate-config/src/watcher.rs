//! Reload the policy when the file is rewritten externally.
//!
//! The preferences editor is a separate process that rewrites the policy
//! file directly. [`PolicyWatcher`] watches the file's directory and pushes
//! reloaded settings into the store, which fires the same per-key
//! subscriptions as an in-process mutation would.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::loader;
use crate::store::PolicyStore;

/// Watches the backing policy file and applies external edits to the store.
/// Dropping the watcher stops the notifications.
pub struct PolicyWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl PolicyWatcher {
    /// Start watching `path` and applying reloads to `store`.
    ///
    /// The parent directory must exist; the file itself may not yet (the
    /// first external save will trigger a reload).
    pub fn spawn(store: Arc<PolicyStore>, path: PathBuf) -> Result<Self> {
        let watched_dir = path
            .parent()
            .map(PathBuf::from)
            .filter(|dir| !dir.as_os_str().is_empty())
            .with_context(|| format!("{} has no parent directory to watch", path.display()))?;

        let config_path = path.clone();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            match event {
                Ok(event) => {
                    if !is_relevant(&event, &config_path) {
                        return;
                    }
                    debug!(path = %config_path.display(), "policy file changed on disk");
                    store.apply_external(loader::load_or_default(&config_path));
                }
                Err(error) => {
                    warn!(%error, "policy file watcher error");
                }
            }
        })
        .context("failed to create policy file watcher")?;

        watcher
            .watch(&watched_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", watched_dir.display()))?;

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    /// The policy file being watched.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

fn is_relevant(event: &Event, config_path: &Path) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    event.paths.iter().any(|path| path == config_path)
}

impl std::fmt::Debug for PolicyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
