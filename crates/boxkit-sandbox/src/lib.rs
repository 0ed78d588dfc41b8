//! Best-effort filesystem write sandboxing for installer subprocesses.
//!
//! The applier is a pure rewrite: given a command and its arguments it
//! returns a possibly-wrapped command that the runner executes. It never
//! spawns anything and never mutates process state itself.
//!
//! Platform variants:
//! - Linux: a new user+mount namespace with the invoking identity mapped to
//!   root inside it (`unshare`). Isolates identity, not write locations —
//!   a weaker guarantee than the macOS variant.
//! - macOS: `sandbox-exec` with a profile that denies all filesystem writes
//!   outside the project root, the scratch directory, and the temp paths.
//! - Everywhere else: pass-through.

mod linux;
mod macos;

use std::path::{Path, PathBuf};

/// The write surface granted to a sandboxed invocation: the managed project
/// root plus a scratch directory. Derived per invocation, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    root: PathBuf,
    scratch_dir: PathBuf,
}

impl SandboxPolicy {
    /// `scratch_dir` may be empty, meaning the platform default temp
    /// directory.
    pub fn new(root: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        let scratch_dir: PathBuf = scratch_dir.into();
        let scratch_dir = if scratch_dir.as_os_str().is_empty() {
            std::env::temp_dir()
        } else {
            scratch_dir
        };
        Self {
            root: root.into(),
            scratch_dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Rewrites a command/argument pair so that the invocation runs under
    /// the platform sandbox. Returns the pair unchanged on platforms with
    /// no supported mechanism.
    pub fn apply(&self, program: &str, args: &[String]) -> (String, Vec<String>) {
        if cfg!(target_os = "linux") {
            linux::wrap(program, args)
        } else if cfg!(target_os = "macos") {
            macos::wrap(program, args, &self.root, &self.scratch_dir)
        } else {
            (program.to_string(), args.to_vec())
        }
    }
}

/// Resolves symlinks in an allow-listed path, falling back to the path as
/// given when resolution fails (e.g. the path does not exist yet). Both
/// forms are allow-listed so a root reached through a symlinked mount stays
/// covered.
pub(crate) fn resolve_symlinks(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
