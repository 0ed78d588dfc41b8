//! Fixed invocation templates for each tool family. Each recipe drives the
//! external package manager into a private tree under `.box` and reports
//! the binaries it published; ownership of everything else is inferred by
//! the snapshot diff around it.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use boxkit_core::{Tool, ToolKind};

use crate::runner::Invocation;
use crate::Manager;

pub(crate) fn invoke(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    match tool.kind {
        ToolKind::Go => install_go(manager, tool),
        ToolKind::Npm => install_npm(manager, tool),
        ToolKind::Cargo => install_cargo(manager, tool),
        ToolKind::Uv => install_uv(manager, tool),
        ToolKind::Gem => install_gem(manager, tool),
        ToolKind::Script => install_script(manager, tool),
    }
}

fn versioned_source(tool: &Tool, separator: &str) -> String {
    let source = tool.source.as_text();
    match tool.version.as_deref() {
        Some(version) if !version.is_empty() => format!("{source}{separator}{version}"),
        _ => source,
    }
}

fn install_go(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    if let Some(version) = tool.version.as_deref() {
        if version.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
            bail!("go tools require a 'v' prefix for versions (e.g., v{version} instead of {version})");
        }
    }

    manager.log(&format!("Installing {} (go)...", tool.display_name()));

    let go_dir = manager.layout().go_dir();
    fs::create_dir_all(&go_dir)
        .with_context(|| format!("failed to create go dir: {}", go_dir.display()))?;

    let source = versioned_source(tool, "@");

    // A persistent GOPATH inside the managed subtree keeps module caches
    // and installed binaries owned by this project.
    let mut invocation = Invocation::new("go", vec!["install".to_string(), source]);
    invocation.env_remove = vec!["GOBIN".to_string()];
    invocation.env = vec![("GOPATH".to_string(), go_dir.display().to_string())];
    invocation.sandbox = tool.sandbox_enabled();
    manager.run_installer(invocation)?;

    manager.link_binaries(&go_dir.join("bin"), &tool.binary_names())
}

fn install_npm(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    manager.log(&format!("Installing {} (npm)...", tool.display_name()));

    let npm_dir = manager.layout().npm_dir();
    let source = versioned_source(tool, "@");

    let mut invocation = Invocation::new(
        "npm",
        vec![
            "install".to_string(),
            "--prefix".to_string(),
            npm_dir.display().to_string(),
            "-g".to_string(),
            source,
        ],
    );
    invocation.sandbox = tool.sandbox_enabled();
    manager.run_installer(invocation)?;

    manager.link_binaries(&npm_dir.join("bin"), &tool.binary_names())
}

fn install_cargo(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    manager.log(&format!("Installing {} (cargo)...", tool.display_name()));

    let cargo_dir = manager.layout().cargo_dir();
    let source = versioned_source(tool, "@");

    let mut args = vec![
        "--root".to_string(),
        cargo_dir.display().to_string(),
        "-y".to_string(),
    ];
    args.extend(tool.args.iter().cloned());
    args.push(source);

    let mut invocation = Invocation::new("cargo-binstall", args);
    invocation.sandbox = tool.sandbox_enabled();
    manager.run_installer(invocation)?;

    manager.link_binaries(&cargo_dir.join("bin"), &tool.binary_names())
}

fn install_uv(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    manager.log(&format!("Installing {} (uv)...", tool.display_name()));

    let uv_dir = manager.layout().uv_dir();
    let uv_bin_dir = uv_dir.join("bin");
    let source = versioned_source(tool, "==");

    let mut args = vec![
        "tool".to_string(),
        "install".to_string(),
        "--force".to_string(),
    ];
    args.extend(tool.args.iter().cloned());
    args.push(source);

    let mut invocation = Invocation::new("uv", args);
    invocation.env = vec![
        ("UV_TOOL_BIN_DIR".to_string(), uv_bin_dir.display().to_string()),
        ("UV_TOOL_DIR".to_string(), uv_dir.display().to_string()),
    ];
    invocation.sandbox = tool.sandbox_enabled();
    manager.run_installer(invocation)?;

    manager.link_binaries(&uv_bin_dir, &tool.binary_names())
}

fn install_gem(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    manager.log(&format!("Installing {} (gem)...", tool.display_name()));

    let gems_dir = manager.layout().gems_dir();
    let gems_bin_dir = gems_dir.join("bin");

    let mut args = vec![
        "install".to_string(),
        "--install-dir".to_string(),
        gems_dir.display().to_string(),
        "--bindir".to_string(),
        gems_bin_dir.display().to_string(),
        "--no-document".to_string(),
    ];
    if let Some(version) = tool.version.as_deref() {
        if !version.is_empty() {
            args.push("-v".to_string());
            args.push(version.to_string());
        }
    }
    args.extend(tool.args.iter().cloned());
    args.push(tool.source.as_text());

    let mut invocation = Invocation::new("gem", args);
    invocation.sandbox = tool.sandbox_enabled();
    manager.run_installer(invocation)?;

    manager.link_binaries(&gems_bin_dir, &tool.binary_names())
}

fn install_script(manager: &Manager, tool: &Tool) -> Result<Vec<String>> {
    manager.log(&format!("Installing via script: {}", tool.display_name()));

    let mut invocation = Invocation::new(
        "sh",
        vec!["-c".to_string(), tool.source.as_text()],
    );
    invocation.env = manager.script_environment();
    invocation.current_dir = Some(manager.root().to_path_buf());
    invocation.sandbox = tool.sandbox_enabled();
    manager.run_installer(invocation)?;

    // Scripts publish into $BOX_BIN_DIR themselves; declared binaries are
    // verified, not linked.
    let bin_dir = manager.layout().bin_dir();
    let mut created = Vec::new();
    for name in &tool.binaries {
        let mut binary_name = name.clone();
        binary_name.push_str(std::env::consts::EXE_SUFFIX);
        let binary_path = bin_dir.join(&binary_name);
        if binary_path.symlink_metadata().is_err() {
            bail!(
                "script installation finished but binary {} not found in {}",
                name,
                bin_dir.display()
            );
        }
        created.push(crate::paths::root_relative_string(manager.root(), &binary_path)?);
    }
    Ok(created)
}

impl Manager {
    /// Environment handed to install scripts: the box paths, the scratch
    /// temp dir, a PATH that resolves already-published binaries, and the
    /// project env from `box.yml`.
    pub(crate) fn script_environment(&self) -> Vec<(String, String)> {
        let box_dir = self.layout().box_dir();
        let bin_dir = self.layout().bin_dir();
        let scratch = self.scratch_dir().display().to_string();

        let mut env = vec![
            ("BOX_DIR".to_string(), box_dir.display().to_string()),
            ("BOX_BIN_DIR".to_string(), bin_dir.display().to_string()),
            ("BOX_OS".to_string(), std::env::consts::OS.to_string()),
            ("BOX_ARCH".to_string(), std::env::consts::ARCH.to_string()),
            ("TMPDIR".to_string(), scratch.clone()),
            ("TEMP".to_string(), scratch.clone()),
            ("TMP".to_string(), scratch),
            ("PATH".to_string(), prepend_path(&bin_dir)),
        ];
        for (key, value) in self.env() {
            env.push((key.clone(), value.clone()));
        }
        env
    }
}

fn prepend_path(bin_dir: &Path) -> String {
    let mut paths = vec![bin_dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths)
        .map(|joined| joined.to_string_lossy().into_owned())
        .unwrap_or_else(|_| bin_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{invoke, prepend_path};
    use crate::runner::OutputSink;
    use crate::Manager;
    use boxkit_core::{Source, Tool, ToolKind};
    use std::collections::BTreeMap;

    fn test_manager() -> Manager {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        path.push(format!("boxkit-recipes-tests-{}-{}", std::process::id(), nanos));
        let scratch = path.join("scratch");
        let mut manager = Manager::new(path, scratch, BTreeMap::new());
        manager.set_output(OutputSink::Quiet);
        manager
    }

    #[test]
    fn go_versions_without_v_prefix_are_rejected() {
        let manager = test_manager();
        let mut tool = Tool::new(ToolKind::Go, Source::single("github.com/example/tool"));
        tool.version = Some("1.2.3".to_string());

        let err = invoke(&manager, &tool).expect_err("must reject");
        assert!(
            err.to_string().contains("require a 'v' prefix"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn prepend_path_puts_the_bin_dir_first() {
        let bin_dir = std::path::PathBuf::from("/project/.box/bin");
        let joined = prepend_path(&bin_dir);
        assert!(joined.starts_with("/project/.box/bin"));
    }

    #[test]
    fn script_environment_exports_box_paths() {
        let mut manager = test_manager();
        manager.env_mut().insert("EXTRA".to_string(), "1".to_string());

        let env = manager.script_environment();
        let lookup = |key: &str| {
            env.iter()
                .find(|(entry_key, _)| entry_key == key)
                .map(|(_, value)| value.clone())
        };

        assert_eq!(
            lookup("BOX_BIN_DIR"),
            Some(manager.layout().bin_dir().display().to_string())
        );
        assert_eq!(lookup("BOX_OS"), Some(std::env::consts::OS.to_string()));
        assert_eq!(
            lookup("TMPDIR"),
            Some(manager.scratch_dir().display().to_string())
        );
        assert_eq!(lookup("EXTRA"), Some("1".to_string()));
    }
}
