use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};

use crate::paths::{relative_to, remove_file_if_exists, root_relative_string};
use crate::Manager;

/// Locates a binary named `name` (or `name` plus the platform executable
/// suffix) anywhere under an installer's private output tree, which may
/// nest OS/arch subfolders. When several matches exist — stale artifacts
/// from a previous version — the most-recently-modified one wins.
pub fn find_binary(search_dir: &Path, name: &str) -> Result<PathBuf> {
    let suffixed = format!("{name}{}", std::env::consts::EXE_SUFFIX);

    let mut newest: Option<(PathBuf, SystemTime)> = None;
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(search_dir.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to read search directory: {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() && !file_type.is_symlink() {
                queue.push_back(path);
                continue;
            }

            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name != name && file_name != suffixed.as_str() {
                continue;
            }

            let modified = fs::symlink_metadata(&path)
                .and_then(|metadata| metadata.modified())
                .with_context(|| format!("failed to stat candidate binary: {}", path.display()))?;
            let newer = match &newest {
                Some((_, newest_modified)) => modified > *newest_modified,
                None => true,
            };
            if newer {
                newest = Some((path, modified));
            }
        }
    }

    newest.map(|(path, _)| path).ok_or_else(|| {
        anyhow!(
            "could not find installed binary '{}' in {}",
            name,
            search_dir.display()
        )
    })
}

impl Manager {
    /// Publishes binaries from an installer's private output tree into the
    /// shared bin directory: relative symlink first (portable across
    /// machines), full copy preserving the mode bits when symlinking is
    /// unavailable. Returns the root-relative destination paths created,
    /// which feed the ownership manifest.
    pub(crate) fn link_binaries(
        &self,
        search_dir: &Path,
        names: &[String],
    ) -> Result<Vec<String>> {
        let bin_dir = self.layout().bin_dir();
        let mut created = Vec::new();

        for name in names {
            let source = find_binary(search_dir, name)?;

            let mut destination_name = name.clone();
            destination_name.push_str(std::env::consts::EXE_SUFFIX);
            let destination = bin_dir.join(&destination_name);

            remove_file_if_exists(&destination).with_context(|| {
                format!(
                    "failed to replace existing binary entry: {}",
                    destination.display()
                )
            })?;

            if try_symlink(self, &bin_dir, &source, &destination) {
                created.push(root_relative_string(self.root(), &destination)?);
                continue;
            }

            self.log(&format!(
                "Copying {} to {}...",
                source.display(),
                destination.display()
            ));
            fs::copy(&source, &destination).with_context(|| {
                format!(
                    "failed to copy installed binary {} to {}",
                    source.display(),
                    destination.display()
                )
            })?;
            created.push(root_relative_string(self.root(), &destination)?);
        }

        Ok(created)
    }
}

#[cfg(unix)]
fn try_symlink(manager: &Manager, bin_dir: &Path, source: &Path, destination: &Path) -> bool {
    let target = relative_to(bin_dir, source);
    manager.log(&format!(
        "Symlinking {} to {}...",
        target.display(),
        destination.display()
    ));
    match std::os::unix::fs::symlink(&target, destination) {
        Ok(()) => true,
        Err(err) => {
            manager.log(&format!("Symlink failed, falling back to copy: {err}"));
            false
        }
    }
}

#[cfg(not(unix))]
fn try_symlink(_manager: &Manager, bin_dir: &Path, source: &Path, _destination: &Path) -> bool {
    // Symlink creation needs elevated rights on most Windows setups; the
    // copy fallback is the reliable path.
    let _ = relative_to(bin_dir, source);
    false
}

#[cfg(test)]
mod tests {
    use super::find_binary;
    use crate::runner::OutputSink;
    use crate::Manager;
    use std::collections::BTreeMap;
    use std::fs;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn test_root() -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        path.push(format!("boxkit-binaries-tests-{}-{}", std::process::id(), nanos));
        path
    }

    #[test]
    fn find_binary_walks_nested_directories() {
        let root = test_root();
        let nested = root.join("linux").join("amd64");
        fs::create_dir_all(&nested).expect("must create dirs");
        fs::write(nested.join("tool"), b"x").expect("must write binary");

        let found = find_binary(&root, "tool").expect("must find");
        assert_eq!(found, nested.join("tool"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn find_binary_prefers_the_newest_match() {
        let root = test_root();
        let stale_dir = root.join("old");
        let fresh_dir = root.join("new");
        fs::create_dir_all(&stale_dir).expect("must create dirs");
        fs::create_dir_all(&fresh_dir).expect("must create dirs");

        fs::write(stale_dir.join("tool"), b"stale").expect("must write stale");
        fs::write(fresh_dir.join("tool"), b"fresh").expect("must write fresh");

        let now = SystemTime::now();
        File::options()
            .write(true)
            .open(stale_dir.join("tool"))
            .expect("must open stale")
            .set_modified(now - Duration::from_secs(3600))
            .expect("must age stale");
        File::options()
            .write(true)
            .open(fresh_dir.join("tool"))
            .expect("must open fresh")
            .set_modified(now)
            .expect("must touch fresh");

        let found = find_binary(&root, "tool").expect("must find");
        assert_eq!(found, fresh_dir.join("tool"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn find_binary_fails_with_the_search_path_on_zero_matches() {
        let root = test_root();
        fs::create_dir_all(&root).expect("must create dirs");

        let err = find_binary(&root, "missing").expect_err("must fail");
        assert!(
            err.to_string().contains(&root.display().to_string()),
            "unexpected error: {err}"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn link_binaries_creates_relative_symlinks_into_bin() {
        let root = test_root();
        let mut manager = Manager::new(&root, root.join("scratch"), BTreeMap::new());
        manager.set_output(OutputSink::Quiet);
        manager.layout().ensure_install_dirs().expect("must create dirs");

        let go_bin = manager.layout().go_dir().join("bin");
        fs::create_dir_all(&go_bin).expect("must create dirs");
        fs::write(go_bin.join("tool"), b"#!/bin/sh\n").expect("must write binary");

        let created = manager
            .link_binaries(&go_bin, &["tool".to_string()])
            .expect("must link");
        assert_eq!(created, vec![".box/bin/tool".to_string()]);

        let destination = manager.layout().bin_dir().join("tool");
        let target = fs::read_link(&destination).expect("must be a symlink");
        assert_eq!(target, std::path::PathBuf::from("../go/bin/tool"));

        let _ = fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn link_binaries_replaces_an_existing_entry() {
        let root = test_root();
        let mut manager = Manager::new(&root, root.join("scratch"), BTreeMap::new());
        manager.set_output(OutputSink::Quiet);
        manager.layout().ensure_install_dirs().expect("must create dirs");

        let go_bin = manager.layout().go_dir().join("bin");
        fs::create_dir_all(&go_bin).expect("must create dirs");
        fs::write(go_bin.join("tool"), b"x").expect("must write binary");
        fs::write(manager.layout().bin_dir().join("tool"), b"old").expect("must write old entry");

        manager
            .link_binaries(&go_bin, &["tool".to_string()])
            .expect("must link over the old entry");
        let destination = manager.layout().bin_dir().join("tool");
        assert!(fs::read_link(&destination).is_ok());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn link_binaries_fails_when_the_binary_is_missing() {
        let root = test_root();
        let mut manager = Manager::new(&root, root.join("scratch"), BTreeMap::new());
        manager.set_output(OutputSink::Quiet);
        manager.layout().ensure_install_dirs().expect("must create dirs");

        let go_bin = manager.layout().go_dir().join("bin");
        fs::create_dir_all(&go_bin).expect("must create dirs");

        let err = manager
            .link_binaries(&go_bin, &["missing".to_string()])
            .expect_err("must fail");
        assert!(
            err.to_string().contains("could not find installed binary"),
            "unexpected error: {err}"
        );

        let _ = fs::remove_dir_all(&root);
    }
}
