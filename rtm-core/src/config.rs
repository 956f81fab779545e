//! Configuration consumed by the core.
//!
//! A collaborator (CLI, web UI) locates and loads the file; the core only
//! defines the recognized options and their defaults. Unknown keys are
//! ignored so older cores tolerate newer config files.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// How concurrent edits are resolved when syncing replicated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Surface conflicts to the operator.
    #[default]
    Manual,
    /// The local edit wins.
    PreferLocal,
    /// The remote edit wins.
    PreferRemote,
}

/// Sync-related options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
}

/// Core configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtmConfig {
    /// Path of the requirements table.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Directory holding per-requirement specification artifacts.
    #[serde(default = "default_requirements_dir")]
    pub requirements_dir: PathBuf,
    /// Name of the active schema (`core`, `taxonomy`, or a registered one).
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
    /// Human labels for development phases, keyed by phase number.
    /// TOML table keys are strings on disk; loading parses them and rejects
    /// anything that is not a positive integer.
    #[serde(
        default,
        deserialize_with = "phases_from_keys",
        serialize_with = "phases_to_keys"
    )]
    pub phases: BTreeMap<u32, String>,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for RtmConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            requirements_dir: default_requirements_dir(),
            schema_name: default_schema_name(),
            phases: BTreeMap::new(),
            sync: SyncSettings::default(),
        }
    }
}

impl RtmConfig {
    /// Human label of a phase, falling back to `Phase N`.
    pub fn phase_name(&self, phase: u32) -> String {
        self.phases
            .get(&phase)
            .cloned()
            .unwrap_or_else(|| format!("Phase {phase}"))
    }

    /// Display form: `Phase N (<label>)` when a label exists.
    pub fn phase_display(&self, phase: Option<i64>) -> String {
        match phase {
            None => "unphased".to_string(),
            Some(n) => {
                let label = u32::try_from(n).ok().and_then(|key| self.phases.get(&key));
                match label {
                    Some(label) => format!("Phase {n} ({label})"),
                    None => format!("Phase {n}"),
                }
            }
        }
    }
}

fn phases_from_keys<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<u32, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, String> = BTreeMap::deserialize(deserializer)?;
    let mut phases = BTreeMap::new();
    for (key, label) in raw {
        let number: u32 = key.parse().map_err(|_| {
            D::Error::custom(format!("phase keys must be positive integers (got '{key}')"))
        })?;
        if number < 1 {
            return Err(D::Error::custom(format!(
                "phase keys must be positive integers (got '{key}')"
            )));
        }
        phases.insert(number, label);
    }
    Ok(phases)
}

fn phases_to_keys<S>(
    phases: &BTreeMap<u32, String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(phases.iter().map(|(number, label)| (number.to_string(), label)))
}

fn default_database_path() -> PathBuf {
    PathBuf::from("docs/rtm_database.csv")
}

fn default_requirements_dir() -> PathBuf {
    PathBuf::from("docs/requirements")
}

fn default_schema_name() -> String {
    "core".to_string()
}

/// Load configuration from a TOML file. Unknown keys are ignored; phase
/// keys that are not positive integers are rejected.
pub fn load_config(path: impl AsRef<Path>) -> Result<RtmConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| crate::error::RtmError::BadTable {
        path: path.to_path_buf(),
        line: None,
        message: format!("invalid config: {e}"),
    })
}
