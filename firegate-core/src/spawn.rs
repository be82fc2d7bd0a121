//! The process-spawn boundary.
//!
//! Sandboxed launches are fire-and-forget: the interceptor hands an
//! invocation to a [`ProcessSpawner`] and moves on. The only failure the
//! boundary reports is failure to *start* the process; whatever the child
//! does afterwards is its own business, matching the non-blocking contract
//! of the launch call being replaced.

use std::process::{Command, Stdio};

use tracing::info;

use crate::command::SandboxInvocation;

/// Error starting the external sandbox process.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to start `{program}`: {source}")]
    Start {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A successfully started sandbox process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    pub pid: u32,
}

/// Starts a sandbox invocation as a detached process.
pub trait ProcessSpawner: Send + Sync {
    fn spawn_detached(&self, invocation: &SandboxInvocation) -> Result<Started, SpawnError>;
}

/// Spawns via `std::process`, detached from the host: null stdio and, on
/// unix, its own process group so shell signals aimed at the host don't
/// reach the sandboxed application.
#[derive(Debug, Default)]
pub struct SystemSpawner;

impl SystemSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for SystemSpawner {
    fn spawn_detached(&self, invocation: &SandboxInvocation) -> Result<Started, SpawnError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| SpawnError::Start {
            program: invocation.program.clone(),
            source,
        })?;

        let pid = child.id();
        info!(program = %invocation.program, pid, "started sandboxed process");
        // The child is intentionally not waited on; launches are
        // fire-and-forget.
        Ok(Started { pid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_a_start_error() {
        let invocation = SandboxInvocation {
            program: "/nonexistent/firegate-test-binary".to_string(),
            args: vec![],
        };
        let error = SystemSpawner::new().spawn_detached(&invocation).unwrap_err();
        assert!(matches!(error, SpawnError::Start { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn spawning_a_real_program_succeeds() {
        let invocation = SandboxInvocation {
            program: "/bin/true".to_string(),
            args: vec![],
        };
        let started = SystemSpawner::new().spawn_detached(&invocation).unwrap();
        assert!(started.pid > 0);
    }
}
