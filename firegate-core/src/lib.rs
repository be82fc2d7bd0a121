//! # firegate-core - Launch interception for Firejail sandboxing
//!
//! Firegate sits between the desktop shell and the applications it
//! launches. When the shell is about to start an application, the
//! interceptor resolves the configured policy for that application and
//! either re-routes the launch through the external `firejail` sandbox at
//! the resolved isolation level or lets the original launch path run
//! untouched.
//!
//! The pieces:
//!
//! - [`decision`]: the pure policy resolver — per-application overrides,
//!   the system-critical deny list, the sandbox-eligible allow list.
//! - [`command`]: turns a decision plus an executable path into a concrete
//!   `firejail` invocation.
//! - [`spawn`]: the detached process-spawn boundary.
//! - [`interceptor`]: hooks the host's launch entry points and ties the
//!   above together, falling back to the unmodified launch on any failure.
//! - [`session`]: the owned enable/disable lifecycle.
//!
//! Sandboxing here is a best-effort enhancement: no failure in this crate
//! may ever stop an application from launching.
//!
//! ```rust,ignore
//! use firegate_core::{EntryPointKind, LaunchRequest, Session};
//!
//! let session = Session::enable(host_entry_points())?;
//! // From each hooked host code path:
//! session
//!     .interceptor()
//!     .launch(EntryPointKind::ShellLaunch, &LaunchRequest::from_metadata(&app))?;
//! ```

pub mod command;
pub mod decision;
pub mod interceptor;
pub mod session;
pub mod spawn;

pub use command::{build_invocation, SandboxInvocation, SANDBOX_PROGRAM};
pub use decision::{resolve, DecisionReason, SandboxDecision};
pub use interceptor::{
    AppMetadata, EntryPointKind, InterceptError, LaunchEntryPoint, LaunchInterceptor,
    LaunchOutcome, LaunchRequest,
};
pub use session::Session;
pub use spawn::{ProcessSpawner, SpawnError, Started, SystemSpawner};
