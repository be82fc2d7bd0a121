//! Loading and saving the policy file.
//!
//! The policy lives in a TOML file (`~/.firegate/firegate.toml` by default,
//! overridable via `FIREGATE_CONFIG_PATH`). Loading never fails: a missing or
//! unreadable file falls back to the fixed default policy so the host shell
//! keeps launching applications no matter what happened to the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{IsolationLevel, OverrideLevel, PolicySettings};

/// Environment variable that overrides the policy file location.
pub const CONFIG_ENV_VAR: &str = "FIREGATE_CONFIG_PATH";
/// Directory under the user's home that holds the policy file.
pub const CONFIG_DIR_NAME: &str = ".firegate";
/// Name of the policy file.
pub const CONFIG_FILE_NAME: &str = "firegate.toml";

/// On-disk shape of the policy file. Overrides are kept as raw wire values
/// so malformed entries can be recovered from individually.
#[derive(Debug, Clone, Deserialize)]
struct PolicyFile {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    sandbox_level: u32,
    #[serde(default)]
    overrides: toml::Table,
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize)]
struct PolicyFileOut<'a> {
    enabled: bool,
    sandbox_level: u32,
    overrides: IndexMap<&'a str, u32>,
}

/// The policy file path honoring `FIREGATE_CONFIG_PATH`.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    default_config_path()
}

/// The default policy file path under the user's home directory.
pub fn default_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().context("could not determine home directory")?;
    Ok(home_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the policy file, falling back to [`PolicySettings::default`] when it
/// is missing or unreadable.
pub fn load_or_default(path: &Path) -> PolicySettings {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            info!(
                path = %path.display(),
                %error,
                "policy file unavailable, using default policy"
            );
            return PolicySettings::default();
        }
    };

    match toml::from_str::<PolicyFile>(&content) {
        Ok(file) => settings_from_file(file),
        Err(error) => {
            info!(
                path = %path.display(),
                %error,
                "policy file unparsable, using default policy"
            );
            PolicySettings::default()
        }
    }
}

/// Persist the policy to disk as pretty TOML, creating the parent directory
/// if needed.
pub fn save(settings: &PolicySettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let out = PolicyFileOut {
        enabled: settings.enabled,
        sandbox_level: settings.default_level.as_raw(),
        overrides: settings
            .overrides
            .iter()
            .map(|(app_id, level)| (app_id.as_str(), level.as_raw()))
            .collect(),
    };
    let content = toml::to_string_pretty(&out).context("failed to serialize policy")?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn settings_from_file(file: PolicyFile) -> PolicySettings {
    let default_level = match IsolationLevel::from_raw(file.sandbox_level) {
        Some(level) => level,
        None => {
            warn!(
                raw = file.sandbox_level,
                "sandbox_level out of range, using basic"
            );
            IsolationLevel::default()
        }
    };

    PolicySettings {
        enabled: file.enabled,
        default_level,
        overrides: decode_overrides(file.overrides),
    }
}

/// Decode the raw override table. A table containing non-integer values is
/// discarded entirely; integer values outside the defined set are dropped
/// per entry.
fn decode_overrides(raw: toml::Table) -> IndexMap<String, OverrideLevel> {
    let mut overrides = IndexMap::with_capacity(raw.len());
    for (app_id, value) in raw {
        let Some(raw_level) = value.as_integer() else {
            warn!(%app_id, "override table is malformed, discarding all overrides");
            return IndexMap::new();
        };
        let level = u32::try_from(raw_level)
            .ok()
            .and_then(OverrideLevel::from_raw);
        match level {
            Some(level) => {
                overrides.insert(app_id, level);
            }
            None => {
                warn!(%app_id, raw = raw_level, "dropping override with undefined level");
            }
        }
    }
    overrides
}
