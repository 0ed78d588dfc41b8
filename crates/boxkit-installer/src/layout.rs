use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Name of the managed subtree under the project root.
pub const BOX_DIR_NAME: &str = ".box";

/// Name of the persisted ownership manifest inside the managed subtree.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Path schema for a managed project: everything boxkit creates lives under
/// `<root>/.box`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxLayout {
    root: PathBuf,
}

impl BoxLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn box_dir(&self) -> PathBuf {
        self.root.join(BOX_DIR_NAME)
    }

    /// The shared directory where every tool's binaries are published.
    pub fn bin_dir(&self) -> PathBuf {
        self.box_dir().join("bin")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.box_dir().join(MANIFEST_FILE_NAME)
    }

    /// Staging sibling used by atomic manifest saves.
    pub fn manifest_tmp_path(&self) -> PathBuf {
        self.box_dir().join(format!("{MANIFEST_FILE_NAME}.tmp"))
    }

    pub fn go_dir(&self) -> PathBuf {
        self.box_dir().join("go")
    }

    pub fn npm_dir(&self) -> PathBuf {
        self.box_dir().join("npm")
    }

    pub fn cargo_dir(&self) -> PathBuf {
        self.box_dir().join("cargo")
    }

    pub fn uv_dir(&self) -> PathBuf {
        self.box_dir().join("uv")
    }

    pub fn gems_dir(&self) -> PathBuf {
        self.box_dir().join("gems")
    }

    pub fn ensure_install_dirs(&self) -> Result<()> {
        let bin_dir = self.bin_dir();
        fs::create_dir_all(&bin_dir)
            .with_context(|| format!("failed to create bin dir: {}", bin_dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::BoxLayout;
    use std::path::Path;

    #[test]
    fn layout_paths_live_under_the_managed_subtree() {
        let layout = BoxLayout::new("/project");
        assert_eq!(layout.box_dir(), Path::new("/project/.box"));
        assert_eq!(layout.bin_dir(), Path::new("/project/.box/bin"));
        assert_eq!(layout.manifest_path(), Path::new("/project/.box/manifest.json"));
        assert_eq!(
            layout.manifest_tmp_path(),
            Path::new("/project/.box/manifest.json.tmp")
        );
        assert_eq!(layout.uv_dir(), Path::new("/project/.box/uv"));
    }
}
