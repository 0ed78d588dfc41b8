use std::collections::BTreeSet;

use anyhow::{Context, Result};
use boxkit_core::Tool;

use crate::manifest::{current_unix_timestamp, Manifest};
use crate::recipes;
use crate::snapshot::capture_state;
use crate::Manager;

impl Manager {
    /// Installs one tool and records everything it created.
    ///
    /// The ownership diff brackets the installer invocation: paths present
    /// after but not before are owned, unioned with whatever the recipe
    /// reports explicitly. Failures leave partially created files in place
    /// (no rollback) and the manifest untouched; a manifest persist failure
    /// after a successful installer run still fails the install, because
    /// ownership tracking is part of what "installed" means.
    pub fn install(&self, tool: &Tool) -> Result<()> {
        self.layout().ensure_install_dirs()?;

        let before = capture_state(self.layout())
            .context("failed to capture state before install")?;

        let reported = recipes::invoke(self, tool)?;

        let after = capture_state(self.layout())
            .context("failed to capture state after install")?;

        let mut owned: BTreeSet<String> = reported.into_iter().collect();
        for path in after.difference(&before) {
            owned.insert(path.clone());
        }

        let mut manifest = Manifest::load(self.layout());
        manifest.update(
            &tool.display_name(),
            tool.kind,
            &tool.source.as_text(),
            tool.version.as_deref().unwrap_or(""),
            owned,
            current_unix_timestamp()?,
        );
        manifest
            .save(self.layout())
            .context("failed to record installed files")
    }

    pub fn load_manifest(&self) -> Manifest {
        Manifest::load(self.layout())
    }
}

#[cfg(test)]
mod tests {
    use crate::runner::OutputSink;
    use crate::Manager;
    use boxkit_core::{Source, Tool, ToolKind};
    use std::collections::BTreeMap;
    use std::fs;

    fn test_manager() -> Manager {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        path.push(format!("boxkit-install-tests-{}-{}", std::process::id(), nanos));
        let scratch = path.join("scratch");
        fs::create_dir_all(&scratch).expect("must create scratch");
        let mut manager = Manager::new(path, scratch, BTreeMap::new());
        manager.set_output(OutputSink::Quiet);
        manager
    }

    fn script_tool(body: &str, binaries: &[&str]) -> Tool {
        let mut tool = Tool::new(ToolKind::Script, Source::single(body));
        tool.binaries = binaries.iter().map(|name| name.to_string()).collect();
        tool.sandbox = Some(false);
        tool
    }

    #[cfg(unix)]
    #[test]
    fn script_install_records_exactly_the_published_binary() {
        let manager = test_manager();
        let tool = script_tool("echo hello > \"$BOX_BIN_DIR/greet\"", &["greet"]);

        manager.install(&tool).expect("must install");

        let manifest = manager.load_manifest();
        let record = manifest
            .tools
            .get("echo hello > \"$BOX_BIN_DIR/greet\"")
            .expect("record must exist");
        assert_eq!(
            record.files.iter().cloned().collect::<Vec<_>>(),
            vec![".box/bin/greet".to_string()]
        );
        assert_eq!(record.kind, ToolKind::Script);

        let greeting =
            fs::read_to_string(manager.layout().bin_dir().join("greet")).expect("must read");
        assert_eq!(greeting.trim(), "hello");

        let _ = fs::remove_dir_all(manager.root());
    }

    #[cfg(unix)]
    #[test]
    fn script_install_with_alias_keys_the_manifest_by_alias() {
        let manager = test_manager();
        let mut tool = script_tool("touch \"$BOX_BIN_DIR/greet\"", &["greet"]);
        tool.alias = Some("greeter".to_string());

        manager.install(&tool).expect("must install");

        let manifest = manager.load_manifest();
        assert!(manifest.tools.contains_key("greeter"));

        let _ = fs::remove_dir_all(manager.root());
    }

    #[cfg(unix)]
    #[test]
    fn diff_claims_untracked_files_an_installer_leaves_behind() {
        let manager = test_manager();
        let tool = script_tool(
            "mkdir -p \"$BOX_DIR/uv/demo\" && touch \"$BOX_DIR/uv/demo/data\" && touch \"$BOX_BIN_DIR/demo\"",
            &["demo"],
        );

        manager.install(&tool).expect("must install");

        let manifest = manager.load_manifest();
        let record = manifest.tools.values().next().expect("record must exist");
        assert!(record.files.contains(".box/uv/demo"));
        assert!(record.files.contains(".box/uv/demo/data"));
        assert!(record.files.contains(".box/bin/demo"));

        let _ = fs::remove_dir_all(manager.root());
    }

    #[cfg(unix)]
    #[test]
    fn reinstall_unions_with_previously_recorded_files() {
        let manager = test_manager();
        let mut tool = script_tool("touch \"$BOX_BIN_DIR/first\"", &["first"]);
        tool.alias = Some("demo".to_string());
        manager.install(&tool).expect("must install");

        tool.source = Source::single("touch \"$BOX_BIN_DIR/second\"");
        tool.binaries = vec!["second".to_string()];
        manager.install(&tool).expect("must reinstall");

        let manifest = manager.load_manifest();
        let record = manifest.tools.get("demo").expect("record must exist");
        assert!(record.files.contains(".box/bin/first"));
        assert!(record.files.contains(".box/bin/second"));

        let _ = fs::remove_dir_all(manager.root());
    }

    #[cfg(unix)]
    #[test]
    fn failed_script_leaves_the_manifest_untouched() {
        let manager = test_manager();
        let tool = script_tool("touch \"$BOX_BIN_DIR/partial\" && exit 1", &[]);

        manager.install(&tool).expect_err("script failure must fail");

        let manifest = manager.load_manifest();
        assert!(manifest.tools.is_empty());
        // Partial output is left in place; there is no rollback.
        assert!(manager.layout().bin_dir().join("partial").exists());

        let _ = fs::remove_dir_all(manager.root());
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn sandboxed_script_cannot_write_outside_root_and_scratch() {
        let manager = test_manager();
        let home = std::env::var("HOME").expect("HOME must be set");
        let escape_path = std::path::PathBuf::from(home).join(format!(
            "boxkit-sandbox-escape-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time")
                .as_nanos()
        ));

        let mut tool = Tool::new(
            ToolKind::Script,
            Source::single(format!("echo blocked > \"{}\"", escape_path.display())),
        );
        tool.sandbox = Some(true);

        manager
            .install(&tool)
            .expect_err("out-of-bounds write must fail the install");
        assert!(
            !escape_path.exists(),
            "sandbox must block the out-of-bounds write"
        );

        let _ = fs::remove_file(&escape_path);
        let _ = fs::remove_dir_all(manager.root());
    }

    #[cfg(unix)]
    #[test]
    fn missing_declared_binary_fails_the_install() {
        let manager = test_manager();
        let tool = script_tool("true", &["never-created"]);

        let err = manager.install(&tool).expect_err("must fail");
        assert!(
            err.to_string().contains("not found"),
            "unexpected error: {err}"
        );

        let _ = fs::remove_dir_all(manager.root());
    }
}
