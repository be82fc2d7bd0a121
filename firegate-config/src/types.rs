//! Typed policy model shared between the store and the decision core.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw wire value persisted for a bypass override.
pub const BYPASS_RAW: u32 = 99;

/// Isolation level applied to a sandboxed launch.
///
/// Levels are ordered: each higher level is strictly more restrictive than
/// the one below it, and its sandbox flag set is a superset of the lower
/// level's.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IsolationLevel {
    /// Blocks root privileges only; network and filesystem stay available.
    #[default]
    Basic,
    /// Adds syscall filtering and denies mount access.
    Strict,
    /// Adds network isolation and a private filesystem on top of Strict.
    Paranoid,
}

impl IsolationLevel {
    /// Map a persisted wire value (`0..=2`) to a level.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Basic),
            1 => Some(Self::Strict),
            2 => Some(Self::Paranoid),
            _ => None,
        }
    }

    /// The wire value this level persists as.
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Basic => 0,
            Self::Strict => 1,
            Self::Paranoid => 2,
        }
    }
}

/// Per-application override: either a concrete level or an explicit opt-out.
///
/// `Bypass` is out-of-band with respect to the level ordering; it means
/// "never sandbox this application regardless of global policy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideLevel {
    Level(IsolationLevel),
    Bypass,
}

impl OverrideLevel {
    /// Map a persisted wire value (`0..=2` or the bypass sentinel) to an
    /// override.
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw == BYPASS_RAW {
            return Some(Self::Bypass);
        }
        IsolationLevel::from_raw(raw).map(Self::Level)
    }

    /// The wire value this override persists as.
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Level(level) => level.as_raw(),
            Self::Bypass => BYPASS_RAW,
        }
    }
}

impl From<IsolationLevel> for OverrideLevel {
    fn from(level: IsolationLevel) -> Self {
        Self::Level(level)
    }
}

/// Identity of a mutable policy setting, used to scope change subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKey {
    /// The global enable flag.
    Enabled,
    /// The global default isolation level.
    DefaultLevel,
    /// The per-application override map.
    Overrides,
}

/// The complete policy state read on every launch interception.
///
/// A single process-wide instance lives in the store; interceptions read
/// immutable snapshots of it, so a launch always sees a consistent state
/// even while the preferences editor is rewriting keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySettings {
    /// Whether launch sandboxing is enabled at all.
    pub enabled: bool,
    /// Level applied to allow-listed applications without an override.
    pub default_level: IsolationLevel,
    /// Per-application overrides, keyed by exact application id.
    pub overrides: IndexMap<String, OverrideLevel>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_level: IsolationLevel::Basic,
            overrides: IndexMap::new(),
        }
    }
}

impl PolicySettings {
    /// Look up the override for an application id (exact key match).
    pub fn override_for(&self, app_id: &str) -> Option<OverrideLevel> {
        self.overrides.get(app_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn levels_are_ordered() {
        assert!(IsolationLevel::Basic < IsolationLevel::Strict);
        assert!(IsolationLevel::Strict < IsolationLevel::Paranoid);
    }

    #[test]
    fn raw_values_match_the_wire_format() {
        assert_eq!(IsolationLevel::from_raw(1), Some(IsolationLevel::Strict));
        assert_eq!(IsolationLevel::from_raw(3), None);
        assert_eq!(OverrideLevel::from_raw(99), Some(OverrideLevel::Bypass));
        assert_eq!(
            OverrideLevel::from_raw(2),
            Some(OverrideLevel::Level(IsolationLevel::Paranoid))
        );
        assert_eq!(OverrideLevel::from_raw(7), None);
        assert_eq!(OverrideLevel::Bypass.as_raw(), 99);
    }

    #[test]
    fn default_settings_enable_basic_sandboxing() {
        let settings = PolicySettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.default_level, IsolationLevel::Basic);
        assert!(settings.overrides.is_empty());
    }
}
