//! Project-local tool installation with file-ownership tracking.
//!
//! Installs go through a snapshot/diff bracket around an external package
//! manager invocation: every path that appears under the managed `.box`
//! subtree during an install is recorded in the ownership manifest, so
//! list/reinstall/uninstall can act on exactly the files a tool produced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod binaries;
mod generate;
mod install;
mod layout;
mod manifest;
mod paths;
mod recipes;
mod runner;
mod snapshot;
mod uninstall;

pub use binaries::find_binary;
pub use layout::{BoxLayout, BOX_DIR_NAME, MANIFEST_FILE_NAME};
pub use manifest::{current_unix_timestamp, Manifest, ToolRecord};
pub use runner::{run_published_binary, OutputSink};
pub use snapshot::capture_state;

/// Orchestrates installs and uninstalls for one managed project root.
///
/// One manager is built per top-level invocation; the scratch directory is
/// that invocation's temp space and is released by the caller on every exit
/// path.
pub struct Manager {
    root: PathBuf,
    layout: BoxLayout,
    scratch_dir: PathBuf,
    env: BTreeMap<String, String>,
    output: OutputSink,
}

impl Manager {
    pub fn new(
        root: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        env: BTreeMap<String, String>,
    ) -> Self {
        let root = root.into();
        let layout = BoxLayout::new(&root);
        Self {
            root,
            layout,
            scratch_dir: scratch_dir.into(),
            env,
            output: OutputSink::Stdout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &BoxLayout {
        &self.layout
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.env
    }

    pub fn set_output(&mut self, output: OutputSink) {
        self.output = output;
    }

    pub(crate) fn output(&self) -> &OutputSink {
        &self.output
    }

    pub(crate) fn log(&self, line: &str) {
        self.output.line(line);
    }
}
