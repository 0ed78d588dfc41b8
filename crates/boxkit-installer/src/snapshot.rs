use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::layout::BoxLayout;
use crate::paths::root_relative_string;

/// Enumerates every entry under the managed subtree as a set of
/// root-relative paths. The ownership diff of an install is computed from
/// two of these captures.
///
/// A missing subtree yields an empty set. The manifest file (and its
/// staging sibling) is excluded so the store never claims itself. Symlinks
/// are recorded but never followed, so a link pointing outside the subtree
/// cannot pull external files into an ownership claim. Any other I/O error
/// aborts the capture; callers must not diff partial data.
pub fn capture_state(layout: &BoxLayout) -> Result<BTreeSet<String>> {
    let mut state = BTreeSet::new();
    let box_dir = layout.box_dir();
    if !box_dir.exists() {
        return Ok(state);
    }

    let manifest_path = layout.manifest_path();
    let manifest_tmp_path = layout.manifest_tmp_path();

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(box_dir);

    while let Some(dir) = queue.pop_front() {
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to read managed directory: {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if path == manifest_path || path == manifest_tmp_path {
                continue;
            }

            state.insert(root_relative_string(layout.root(), &path)?);

            let file_type = entry.file_type()?;
            if file_type.is_dir() && !file_type.is_symlink() {
                queue.push_back(path);
            }
        }
    }

    Ok(state)
}
