use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tool::{detect_binary_name, Tool};

/// Name of the per-project configuration file.
pub const CONFIG_FILE_NAME: &str = "box.yml";

/// The top-level `box.yml` configuration: the tools to install and the
/// project environment variables exported alongside them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Config {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("failed to parse box configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration: {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("failed to parse configuration: {}", path.display()))
    }

    /// Loads the configuration, treating a missing file as empty. Used by
    /// commands that work without one (`run`, `env`).
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml_str(&raw)
                .with_context(|| format!("failed to parse configuration: {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read configuration: {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_yaml::to_string(self).context("failed to serialize box configuration")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write configuration: {}", path.display()))
    }

    /// Looks up the tool declaration that publishes the given binary name,
    /// checking declared binaries first and falling back to the name
    /// derived from the source.
    pub fn find_tool_for_binary(&self, binary_name: &str) -> Option<&Tool> {
        for tool in &self.tools {
            if tool.binaries.iter().any(|name| name == binary_name) {
                return Some(tool);
            }
            if tool.binaries.is_empty()
                && detect_binary_name(&tool.source.as_text()) == binary_name
            {
                return Some(tool);
            }
        }
        None
    }

    pub fn sandbox_enabled_for_binary(&self, binary_name: &str) -> bool {
        self.find_tool_for_binary(binary_name)
            .map(Tool::sandbox_enabled)
            .unwrap_or(false)
    }
}

/// Walks from `start_dir` toward the filesystem root looking for the
/// nearest `box.yml`.
pub fn find_nearest_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir;
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}
