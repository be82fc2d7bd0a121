//! Building the firejail invocation for a sandbox decision.

use std::path::Path;

use firegate_config::{IsolationLevel, OverrideLevel};
use tracing::warn;

use crate::decision::SandboxDecision;

/// The external sandbox program. Treated as opaque; it only has to accept
/// the flags below and the target executable as its final argument.
pub const SANDBOX_PROGRAM: &str = "firejail";

/// Flags applied at every level: quiet operation, no root escalation.
const BASE_FLAGS: &[&str] = &["--quiet", "--noroot"];
/// Added at Strict and above: syscall filtering, no mount access.
const STRICT_FLAGS: &[&str] = &["--seccomp", "--disable-mnt"];
/// Added at Paranoid only: no network, private filesystem.
const PARANOID_FLAGS: &[&str] = &["--net=none", "--private"];

/// A fully assembled sandbox invocation, ready for the spawn boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl SandboxInvocation {
    /// Program followed by all arguments, as an argument vector.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// The invocation as a single shell command line. Arguments that need it
    /// (embedded spaces, quotes) are shell-quoted.
    pub fn command_line(&self) -> String {
        shell_words::join(self.argv())
    }
}

/// The flag set for an isolation level. Each level's set is a superset of
/// the level below it.
pub fn flags_for(level: IsolationLevel) -> Vec<&'static str> {
    let mut flags = BASE_FLAGS.to_vec();
    if level >= IsolationLevel::Strict {
        flags.extend_from_slice(STRICT_FLAGS);
    }
    if level >= IsolationLevel::Paranoid {
        flags.extend_from_slice(PARANOID_FLAGS);
    }
    flags
}

/// Build the sandbox invocation for `executable` under `decision`.
///
/// A bypass decision must be filtered out by the resolver before it gets
/// here; if one arrives anyway that is a policy-invariant violation, logged
/// and answered with `None` so the caller falls back to the unmodified
/// launch path.
pub fn build_invocation(executable: &Path, decision: &SandboxDecision) -> Option<SandboxInvocation> {
    let level = match decision.level {
        OverrideLevel::Level(level) => level,
        OverrideLevel::Bypass => {
            warn!("bypass decision reached the command builder");
            return None;
        }
    };

    let mut args: Vec<String> = flags_for(level).iter().map(|flag| flag.to_string()).collect();
    args.push(executable.display().to_string());

    Some(SandboxInvocation {
        program: SANDBOX_PROGRAM.to_string(),
        args,
    })
}
