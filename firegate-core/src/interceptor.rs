//! Launch interception.
//!
//! The host desktop shell has three distinct code paths that launch an
//! application: the shell-level app-launch call, the shell-level
//! app-activate call, and the lower-level app-info launch call. They are
//! semantically equivalent for our purposes and each one gets wrapped
//! identically: the host registers the captured original behavior for each
//! entry point and routes launches through [`LaunchInterceptor::launch`],
//! which decides between a sandboxed spawn and the original path.
//!
//! Sandboxing is best-effort. Every failure on the sandboxed path falls
//! back to the captured original behavior, invoked exactly once, so an
//! application always launches the way it would have without us.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use firegate_config::PolicyStore;

use crate::command::build_invocation;
use crate::decision::resolve;
use crate::spawn::{ProcessSpawner, Started};

/// Identity of a launch entry point in the host shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPointKind {
    /// The shell-level app-launch call.
    ShellLaunch,
    /// The shell-level app-activate call.
    ShellActivate,
    /// The lower-level app-info launch call.
    AppInfoLaunch,
}

impl EntryPointKind {
    /// All entry points a complete installation wraps.
    pub const ALL: [EntryPointKind; 3] = [
        EntryPointKind::ShellLaunch,
        EntryPointKind::ShellActivate,
        EntryPointKind::AppInfoLaunch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShellLaunch => "shell-app-launch",
            Self::ShellActivate => "shell-app-activate",
            Self::AppInfoLaunch => "app-info-launch",
        }
    }
}

impl std::fmt::Display for EntryPointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application metadata boundary: whatever receiver the host's launch call
/// carries, reduced to an identifier and an executable path.
pub trait AppMetadata {
    /// The application identifier (desktop-entry or reverse-DNS style).
    fn app_id(&self) -> Option<String>;
    /// Path to the application's executable, when the host knows it.
    fn executable(&self) -> Option<PathBuf>;
}

/// One launch attempt, constructed fresh per interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Application id; empty when the host could not identify the app.
    pub app_id: String,
    pub executable: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn new(app_id: impl Into<String>, executable: Option<PathBuf>) -> Self {
        Self {
            app_id: app_id.into(),
            executable,
        }
    }

    /// Build a request from the host's launch-call receiver.
    pub fn from_metadata(metadata: &dyn AppMetadata) -> Self {
        Self {
            app_id: metadata.app_id().unwrap_or_default(),
            executable: metadata.executable(),
        }
    }
}

/// A host launch entry point with its original, unmodified behavior.
///
/// Installing one of these captures the pre-hook behavior; the interceptor
/// invokes it for every launch that is not (or cannot be) sandboxed, and
/// teardown hands it back untouched.
pub trait LaunchEntryPoint: Send + Sync {
    fn kind(&self) -> EntryPointKind;

    /// Invoke the original launch behavior. The result is returned to the
    /// host exactly as the unmodified path would have returned it.
    fn launch_original(&self, request: &LaunchRequest) -> Result<()>;
}

/// How an intercepted launch completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The sandboxed process started; the original path was not invoked.
    Sandboxed(Started),
    /// The original, unmodified launch behavior ran.
    PassedThrough,
}

/// Errors in hook registration and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("no hook installed for {0}")]
    NotInstalled(EntryPointKind),
    #[error("{0} is already hooked")]
    AlreadyInstalled(EntryPointKind),
}

/// Wraps the host's launch entry points behind policy resolution.
pub struct LaunchInterceptor {
    store: Arc<PolicyStore>,
    spawner: Arc<dyn ProcessSpawner>,
    hooks: RwLock<HashMap<EntryPointKind, Arc<dyn LaunchEntryPoint>>>,
}

impl LaunchInterceptor {
    pub fn new(store: Arc<PolicyStore>, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            store,
            spawner,
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Capture an entry point's original behavior. Each entry point can be
    /// hooked once; a second install for the same identity is rejected so a
    /// captured behavior can never be silently overwritten.
    pub fn install(&self, entry_point: Arc<dyn LaunchEntryPoint>) -> Result<(), InterceptError> {
        let kind = entry_point.kind();
        let mut hooks = self.hooks.write();
        if hooks.contains_key(&kind) {
            return Err(InterceptError::AlreadyInstalled(kind));
        }
        debug!(%kind, "installing launch hook");
        hooks.insert(kind, entry_point);
        Ok(())
    }

    /// Whether an entry point is currently hooked.
    pub fn installed(&self, kind: EntryPointKind) -> bool {
        self.hooks.read().contains_key(&kind)
    }

    /// Release one hook, handing back the captured original behavior.
    /// Restoring an entry point that was never installed is a no-op.
    pub fn restore(&self, kind: EntryPointKind) -> Option<Arc<dyn LaunchEntryPoint>> {
        let removed = self.hooks.write().remove(&kind);
        if removed.is_some() {
            debug!(%kind, "restored launch hook");
        }
        removed
    }

    /// Release every hook. Called on teardown; safe to call repeatedly.
    pub fn restore_all(&self) {
        for kind in EntryPointKind::ALL {
            self.restore(kind);
        }
    }

    /// Handle one launch arriving at an entry point.
    ///
    /// The original behavior runs unmodified when sandboxing is globally
    /// disabled, when the policy does not apply to this application, when
    /// the executable path is unavailable, and when the sandboxed process
    /// fails to start. A successful sandboxed start replaces the original
    /// launch entirely.
    pub fn launch(&self, kind: EntryPointKind, request: &LaunchRequest) -> Result<LaunchOutcome> {
        let entry_point = self
            .hooks
            .read()
            .get(&kind)
            .cloned()
            .ok_or(InterceptError::NotInstalled(kind))?;

        debug!(%kind, app_id = %request.app_id, "launch intercepted");

        let snapshot = self.store.snapshot();
        if !snapshot.enabled {
            return Self::pass_through(&entry_point, request);
        }

        let decision = resolve(&request.app_id, &snapshot);
        if !decision.should_sandbox {
            debug!(app_id = %request.app_id, reason = ?decision.reason, "not sandboxing");
            return Self::pass_through(&entry_point, request);
        }

        let Some(executable) = request.executable.as_deref() else {
            debug!(app_id = %request.app_id, "executable unknown, using unmodified launch");
            return Self::pass_through(&entry_point, request);
        };

        let Some(invocation) = build_invocation(executable, &decision) else {
            // The builder logged the invariant violation already.
            return Self::pass_through(&entry_point, request);
        };

        match self.spawner.spawn_detached(&invocation) {
            Ok(started) => {
                info!(app_id = %request.app_id, pid = started.pid, "launched sandboxed");
                Ok(LaunchOutcome::Sandboxed(started))
            }
            Err(error) => {
                warn!(
                    app_id = %request.app_id,
                    %error,
                    "sandbox start failed, falling back to unmodified launch"
                );
                Self::pass_through(&entry_point, request)
            }
        }
    }

    fn pass_through(
        entry_point: &Arc<dyn LaunchEntryPoint>,
        request: &LaunchRequest,
    ) -> Result<LaunchOutcome> {
        entry_point.launch_original(request)?;
        Ok(LaunchOutcome::PassedThrough)
    }
}

impl std::fmt::Debug for LaunchInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<EntryPointKind> = self.hooks.read().keys().copied().collect();
        f.debug_struct("LaunchInterceptor")
            .field("hooks", &kinds)
            .finish_non_exhaustive()
    }
}
