//! # firegate-config - Policy store for Firegate
//!
//! Holds the sandbox launch policy: the global enable flag, the global
//! default isolation level, and the per-application override map. The policy
//! persists as TOML (`~/.firegate/firegate.toml` by default) and is exposed
//! to the decision core as a [`PolicyStore`] with lock-free snapshot reads
//! and per-key change subscriptions.
//!
//! External collaborators (the preferences editor, the status indicator)
//! interact with the same file and the same store: the editor rewrites the
//! file on disk and [`PolicyWatcher`] folds the edit back into the running
//! store; the indicator subscribes to [`PolicyKey::Enabled`].

pub mod loader;
pub mod store;
pub mod types;
pub mod watcher;

pub use store::{PolicyStore, SubscriptionId};
pub use types::{BYPASS_RAW, IsolationLevel, OverrideLevel, PolicyKey, PolicySettings};
pub use watcher::PolicyWatcher;
