//! macOS variant: a deny-by-default Seatbelt profile run via `sandbox-exec`.
//!
//! The profile allows everything except filesystem writes, then re-allows
//! writes under the project root, the scratch directory, and the system
//! temp directory. Each path is listed in raw and symlink-resolved form;
//! on macOS `/var` and `/tmp` are symlinks into `/private`, and a profile
//! that names only the unresolved form would deny the real write target.

use std::collections::BTreeSet;
use std::path::Path;

use crate::resolve_symlinks;

pub(crate) fn wrap(
    program: &str,
    args: &[String],
    root: &Path,
    scratch_dir: &Path,
) -> (String, Vec<String>) {
    let profile = build_profile(root, scratch_dir);
    let mut wrapped = vec!["-p".to_string(), profile, program.to_string()];
    wrapped.extend(args.iter().cloned());
    ("sandbox-exec".to_string(), wrapped)
}

pub(crate) fn build_profile(root: &Path, scratch_dir: &Path) -> String {
    let mut allowed_subpaths = BTreeSet::new();
    for path in [
        root.to_path_buf(),
        resolve_symlinks(root),
        scratch_dir.to_path_buf(),
        resolve_symlinks(scratch_dir),
        std::env::temp_dir(),
        resolve_symlinks(&std::env::temp_dir()),
    ] {
        allowed_subpaths.insert(path.to_string_lossy().into_owned());
    }

    let mut profile = String::from("(version 1)\n(allow default)\n(deny file-write*)\n");
    for subpath in &allowed_subpaths {
        profile.push_str(&format!("(allow file-write* (subpath {subpath:?}))\n"));
    }
    for device in ["/dev/null", "/dev/zero", "/dev/stdout", "/dev/stderr"] {
        profile.push_str(&format!("(allow file-write* (literal {device:?}))\n"));
    }
    profile
}
