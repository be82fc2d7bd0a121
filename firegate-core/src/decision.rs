//! Policy resolution: which applications get sandboxed, and how hard.

use firegate_config::{OverrideLevel, PolicySettings};
use tracing::debug;

/// Applications that keep the desktop session alive or manage the system
/// itself. Sandboxing these can lock the user out of their own machine, so
/// they are refused regardless of the global policy. Matched by substring
/// containment against the application id.
pub const SYSTEM_CRITICAL_APPS: &[&str] = &[
    "org.gnome.Shell",
    "org.gnome.Settings",
    "org.gnome.SystemMonitor",
    "org.gnome.Terminal",
    "org.gnome.Console",
    "org.gnome.Software",
    "org.gnome.Extensions",
];

/// General-purpose applications eligible for automatic sandboxing at the
/// global default level. Matched by substring containment against the
/// application id.
pub const SANDBOX_ELIGIBLE_APPS: &[&str] = &[
    "org.gnome.Calculator",
    "org.gnome.TextEditor",
    "org.mozilla.firefox",
    "firefox.desktop",
    "org.gnome.Nautilus",
    "org.gnome.gedit",
];

/// Why the resolver decided the way it did. Carried on the decision for
/// logging and auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// The launch request carried no application identity.
    MissingAppId,
    /// An explicit per-application override applied.
    Override,
    /// The override map opted this application out entirely.
    OverrideBypass,
    /// The application matched the system-critical deny list.
    SystemCritical,
    /// The application matched the sandbox-eligible allow list.
    AllowListed,
    /// The application matched neither list; unknown apps are never
    /// sandboxed automatically.
    Unmatched,
}

/// The outcome of resolving one launch request against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxDecision {
    pub should_sandbox: bool,
    pub level: OverrideLevel,
    pub reason: DecisionReason,
}

impl SandboxDecision {
    fn skip(reason: DecisionReason) -> Self {
        Self {
            should_sandbox: false,
            level: OverrideLevel::Level(Default::default()),
            reason,
        }
    }

    fn bypass() -> Self {
        Self {
            should_sandbox: false,
            level: OverrideLevel::Bypass,
            reason: DecisionReason::OverrideBypass,
        }
    }

    fn sandbox(level: OverrideLevel, reason: DecisionReason) -> Self {
        Self {
            should_sandbox: true,
            level,
            reason,
        }
    }
}

/// Resolve the sandbox decision for one application id.
///
/// Precedence, strictly in order: missing identity, per-application override
/// (exact key match; bypass wins over everything including the deny list),
/// system-critical deny list, sandbox-eligible allow list, conservative
/// default (no sandbox).
///
/// List matching is substring containment, not exact equality, so
/// `.desktop`-suffixed identifier variants still match. The flip side is
/// that an unrelated id containing a listed id as a substring matches too;
/// that ambiguity is preserved deliberately for compatibility with existing
/// policies.
///
/// The global enable flag is not consulted here: the interceptor checks it
/// before resolving, so a decision is a pure function of the application id
/// and the settings snapshot.
pub fn resolve(app_id: &str, settings: &PolicySettings) -> SandboxDecision {
    if app_id.is_empty() {
        return SandboxDecision::skip(DecisionReason::MissingAppId);
    }

    if let Some(level) = settings.override_for(app_id) {
        return match level {
            OverrideLevel::Bypass => {
                debug!(%app_id, "bypassing sandbox (override)");
                SandboxDecision::bypass()
            }
            OverrideLevel::Level(_) => {
                debug!(%app_id, ?level, "sandboxing (override)");
                SandboxDecision::sandbox(level, DecisionReason::Override)
            }
        };
    }

    if SYSTEM_CRITICAL_APPS.iter().any(|sys| app_id.contains(sys)) {
        return SandboxDecision::skip(DecisionReason::SystemCritical);
    }

    if SANDBOX_ELIGIBLE_APPS.iter().any(|app| app_id.contains(app)) {
        return SandboxDecision::sandbox(
            OverrideLevel::Level(settings.default_level),
            DecisionReason::AllowListed,
        );
    }

    SandboxDecision::skip(DecisionReason::Unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use firegate_config::IsolationLevel;
    use pretty_assertions::assert_eq;

    fn settings_with_override(app_id: &str, level: OverrideLevel) -> PolicySettings {
        let mut settings = PolicySettings::default();
        settings.overrides.insert(app_id.to_string(), level);
        settings
    }

    #[test]
    fn empty_app_id_is_never_sandboxed() {
        let decision = resolve("", &PolicySettings::default());
        assert!(!decision.should_sandbox);
        assert_eq!(decision.reason, DecisionReason::MissingAppId);
    }

    #[test]
    fn bypass_override_wins_over_everything() {
        // Even a deny-listed id gets its bypass honored before list checks.
        let settings = settings_with_override("org.gnome.Terminal", OverrideLevel::Bypass);
        let decision = resolve("org.gnome.Terminal", &settings);
        assert!(!decision.should_sandbox);
        assert_eq!(decision.reason, DecisionReason::OverrideBypass);
        assert_eq!(decision.level, OverrideLevel::Bypass);
    }

    #[test]
    fn level_override_beats_the_deny_list() {
        let settings = settings_with_override(
            "org.gnome.Console",
            OverrideLevel::Level(IsolationLevel::Paranoid),
        );
        let decision = resolve("org.gnome.Console", &settings);
        assert!(decision.should_sandbox);
        assert_eq!(decision.level, OverrideLevel::Level(IsolationLevel::Paranoid));
        assert_eq!(decision.reason, DecisionReason::Override);
    }

    #[test]
    fn override_lookup_is_exact_not_substring() {
        let settings = settings_with_override("org.gnome.gedit", OverrideLevel::Bypass);
        // A .desktop variant does not hit the override, but still matches the
        // allow list by substring.
        let decision = resolve("org.gnome.gedit.desktop", &settings);
        assert!(decision.should_sandbox);
        assert_eq!(decision.reason, DecisionReason::AllowListed);
    }

    #[test]
    fn system_critical_apps_are_refused() {
        let decision = resolve("org.gnome.Shell", &PolicySettings::default());
        assert!(!decision.should_sandbox);
        assert_eq!(decision.reason, DecisionReason::SystemCritical);
    }

    #[test]
    fn allow_listed_apps_use_the_default_level() {
        let settings = PolicySettings {
            default_level: IsolationLevel::Strict,
            ..PolicySettings::default()
        };
        let decision = resolve("org.gnome.Calculator.desktop", &settings);
        assert!(decision.should_sandbox);
        assert_eq!(decision.level, OverrideLevel::Level(IsolationLevel::Strict));
        assert_eq!(decision.reason, DecisionReason::AllowListed);
    }

    #[test]
    fn unknown_apps_are_never_sandboxed() {
        let decision = resolve("com.example.Unknown", &PolicySettings::default());
        assert!(!decision.should_sandbox);
        assert_eq!(decision.reason, DecisionReason::Unmatched);
    }

    #[test]
    fn resolution_is_idempotent() {
        let settings = PolicySettings {
            default_level: IsolationLevel::Paranoid,
            ..PolicySettings::default()
        };
        let first = resolve("org.mozilla.firefox", &settings);
        let second = resolve("org.mozilla.firefox", &settings);
        assert_eq!(first, second);
    }
}
