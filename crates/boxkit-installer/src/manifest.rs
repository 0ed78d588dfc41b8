use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use boxkit_core::ToolKind;
use serde::{Deserialize, Serialize};

use crate::layout::BoxLayout;

/// Per-tool ownership record. `files` holds root-relative `/`-separated
/// paths; it only ever grows across reinstalls. Timestamps are unix
/// seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub files: BTreeSet<String>,
    pub installed: u64,
    pub updated: u64,
}

/// The persisted `{identity -> ToolRecord}` store — the single source of
/// truth for file ownership. Loaded fresh, mutated in memory, rewritten in
/// full on every update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tools: BTreeMap<String, ToolRecord>,
}

impl Manifest {
    /// Reads the persisted store. An absent or unreadable or corrupt file
    /// degrades to an empty manifest — the store is always either valid
    /// structured data or treated as absent.
    pub fn load(layout: &BoxLayout) -> Self {
        let path = layout.manifest_path();
        let Ok(raw) = fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Merges an install result into the store. An existing identity keeps
    /// its `installed` timestamp and unions the file set (never shrinks);
    /// a new identity gets both timestamps set to `now`.
    pub fn update(
        &mut self,
        identity: &str,
        kind: ToolKind,
        source: &str,
        version: &str,
        files: BTreeSet<String>,
        now: u64,
    ) {
        match self.tools.get_mut(identity) {
            Some(record) => {
                record.kind = kind;
                record.source = source.to_string();
                record.version = version.to_string();
                record.files.extend(files);
                record.updated = now;
            }
            None => {
                self.tools.insert(
                    identity.to_string(),
                    ToolRecord {
                        kind,
                        source: source.to_string(),
                        version: version.to_string(),
                        files,
                        installed: now,
                        updated: now,
                    },
                );
            }
        }
    }

    /// Serializes the whole store, staging to a sibling file and renaming
    /// over the manifest so a crash can never leave a truncated store.
    pub fn save(&self, layout: &BoxLayout) -> Result<()> {
        let path = layout.manifest_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let raw = serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        let tmp_path = layout.manifest_tmp_path();
        fs::write(&tmp_path, raw)
            .with_context(|| format!("failed to write manifest: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "failed to replace manifest {} with {}",
                path.display(),
                tmp_path.display()
            )
        })
    }
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
