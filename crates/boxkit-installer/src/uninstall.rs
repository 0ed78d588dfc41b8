use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::manifest::Manifest;
use crate::paths::is_safe_manifest_path;
use crate::Manager;

impl Manager {
    /// Removes a tool and exactly the files its record owns.
    ///
    /// Files were stored in ascending path order, so iterating in reverse
    /// deletes deepest-first. Every candidate is checked against the
    /// managed root before deletion; a path that escapes (absolute,
    /// parent-directory segment, drive designator) is logged and skipped so
    /// one tampered entry cannot block cleanup of the rest. Directories are
    /// removed only when empty. Tools with no record fall back to
    /// best-effort removal of conventional locations.
    pub fn uninstall(&self, name: &str) -> Result<()> {
        let mut manifest = Manifest::load(self.layout());
        let Some(record) = manifest.tools.get(name).cloned() else {
            return self.uninstall_best_effort(name);
        };

        for file in record.files.iter().rev() {
            if !is_safe_manifest_path(file) {
                self.log(&format!(
                    "Security warning: skipping deletion of unsafe path {file}"
                ));
                continue;
            }
            let full_path = self.root().join(file);
            debug_assert!(full_path.starts_with(self.root()));

            let Ok(metadata) = fs::symlink_metadata(&full_path) else {
                continue;
            };

            if metadata.is_dir() {
                if directory_is_empty(&full_path) {
                    self.log(&format!("Removing empty directory {file}..."));
                    let _ = fs::remove_dir(&full_path);
                }
            } else {
                self.log(&format!("Removing file {file}..."));
                let _ = fs::remove_file(&full_path);
            }
        }

        manifest.tools.remove(name);
        manifest
            .save(self.layout())
            .context("failed to record uninstall")
    }

    /// Cleanup for tools installed before ownership tracking existed: the
    /// conventionally named binary in the shared bin dir and the uv data
    /// directory for the name, nothing else.
    fn uninstall_best_effort(&self, name: &str) -> Result<()> {
        let mut binary_name = name.to_string();
        binary_name.push_str(std::env::consts::EXE_SUFFIX);
        let binary_path = self.layout().bin_dir().join(&binary_name);
        if binary_path.symlink_metadata().is_ok() {
            self.log(&format!("Removing binary {}...", binary_path.display()));
            let _ = fs::remove_file(&binary_path);
        }

        let uv_tool_dir = self.layout().uv_dir().join(name);
        if uv_tool_dir.is_dir() {
            self.log(&format!(
                "Removing data directory {}...",
                uv_tool_dir.display()
            ));
            let _ = fs::remove_dir_all(&uv_tool_dir);
        }

        Ok(())
    }
}

fn directory_is_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
