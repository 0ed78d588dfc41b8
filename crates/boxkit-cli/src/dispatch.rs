use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use boxkit_core::{find_nearest_config, Config, Source, Tool, ToolKind, CONFIG_FILE_NAME};
use boxkit_installer::{run_published_binary, BoxLayout, Manager, OutputSink};
use clap::CommandFactory;

use crate::render;
use crate::{Cli, Commands, GenerateTarget};

pub(crate) fn run_cli(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Install {
            file,
            non_interactive,
        } => run_install(&file, non_interactive),
        Commands::Add { kind, spec, args } => run_add(&kind, &spec, args),
        Commands::Uninstall { name } => run_uninstall(&name),
        Commands::List => run_list(),
        Commands::Run { command, args } => run_binary(&command, &args),
        Commands::Env { key } => run_env(key.as_deref()),
        Commands::Generate { target } => run_generate(target),
        Commands::Doctor => run_doctor(),
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "boxkit", &mut io::stdout());
            Ok(0)
        }
    }
}

/// Builds the per-invocation manager plus its scratch directory. The
/// returned guard removes the scratch tree when it drops, on every exit
/// path — callers must keep it alive for the manager's lifetime.
fn new_manager(
    root: &Path,
    env: BTreeMap<String, String>,
) -> Result<(Manager, tempfile::TempDir)> {
    let scratch = tempfile::Builder::new()
        .prefix("boxkit-")
        .tempdir()
        .context("failed to create scratch directory")?;
    let manager = Manager::new(root, scratch.path(), env);
    Ok((manager, scratch))
}

fn project_root() -> Result<PathBuf> {
    std::env::current_dir().context("failed to get current working directory")
}

fn run_install(file: &Path, non_interactive: bool) -> Result<i32> {
    if !file.exists() {
        bail!("configuration file {} not found", file.display());
    }
    let config = Config::load(file)?;
    let root = project_root()?;
    let (mut manager, _scratch) = new_manager(&root, config.env.clone())?;

    if non_interactive {
        println!("Starting tool installation (non-interactive)...");
        manager.set_output(OutputSink::Stdout);
        for tool in &config.tools {
            let name = tool.display_name();
            println!("* Installing {name}...");
            if let Err(err) = manager.install(tool) {
                println!("{} Failed to install {name}: {err:#}", render::cross_mark());
                return Ok(1);
            }
            println!("{} Successfully installed {name}", render::check_mark());
        }
        println!("All tools installed successfully.");
        return Ok(0);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        let _ = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst));
    }

    println!();
    println!("  {}", render::title("Installing tools"));
    for tool in &config.tools {
        if interrupted.load(Ordering::SeqCst) {
            println!(
                "  {} Interrupted; remaining tools were not installed.",
                render::warn_mark()
            );
            return Ok(130);
        }

        let name = tool.display_name();
        let spinner = render::tool_spinner(&name);
        let progress = spinner.clone();
        manager.set_output(OutputSink::Callback(Box::new(move |line| {
            progress.set_message(line.to_string());
        })));

        match manager.install(tool) {
            Ok(()) => {
                spinner.finish_and_clear();
                println!("  {} {name}", render::check_mark());
            }
            Err(err) => {
                spinner.finish_and_clear();
                if interrupted.load(Ordering::SeqCst) {
                    println!("  {} {name} (interrupted)", render::warn_mark());
                    return Ok(130);
                }
                println!("  {} {name}", render::cross_mark());
                println!("    {}", render::dim(&format!("{err:#}")));
                return Ok(1);
            }
        }
    }
    println!();
    println!("  All tools installed successfully.");
    Ok(0)
}

pub(crate) fn parse_add_spec(spec: &str) -> (String, Option<String>) {
    match spec.split_once('@') {
        Some((source, version)) if !version.is_empty() => {
            (source.to_string(), Some(version.to_string()))
        }
        Some((source, _)) => (source.to_string(), None),
        None => (spec.to_string(), None),
    }
}

fn run_add(kind: &str, spec: &str, args: Vec<String>) -> Result<i32> {
    let kind = ToolKind::parse(kind)?;
    let (source, version) = parse_add_spec(spec);

    let config_path = project_root()?.join(CONFIG_FILE_NAME);
    let mut config = Config::load_or_default(&config_path)?;

    if config
        .tools
        .iter()
        .any(|tool| tool.source.as_text() == source)
    {
        println!(
            "{} Tool with source {source} already exists in {}",
            render::warn_mark(),
            config_path.display()
        );
        return Ok(0);
    }

    let mut tool = Tool::new(kind, Source::single(source.clone()));
    tool.version = version.clone();
    tool.args = args;
    config.tools.push(tool);
    config.save(&config_path)?;

    match version {
        Some(version) => println!(
            "{} Added {source} (version {version}) to {}",
            render::check_mark(),
            config_path.display()
        ),
        None => println!(
            "{} Added {source} to {}",
            render::check_mark(),
            config_path.display()
        ),
    }
    println!("Run 'boxkit install' to install it.");
    Ok(0)
}

fn run_uninstall(name: &str) -> Result<i32> {
    let root = project_root()?;
    let (manager, _scratch) = new_manager(&root, BTreeMap::new())?;
    manager.uninstall(name)?;
    println!("{} Uninstalled {name}", render::check_mark());
    Ok(0)
}

fn run_list() -> Result<i32> {
    let root = project_root()?;
    let config = Config::load(&root.join(CONFIG_FILE_NAME))?;
    let (manager, _scratch) = new_manager(&root, config.env.clone())?;
    let manifest = manager.load_manifest();

    println!("{}", render::title("Installed tools:"));
    for tool in &config.tools {
        let name = tool.display_name();
        println!(
            "* {} {}",
            name,
            render::dim(&format!("({})", tool.kind))
        );
        if let Some(record) = manifest.tools.get(&name) {
            let binaries: Vec<&str> = record
                .files
                .iter()
                .filter_map(|file| file.strip_prefix(".box/bin/"))
                .filter(|base| !base.contains('/'))
                .collect();
            if !binaries.is_empty() {
                println!(
                    "  {} {}",
                    render::dim("binaries:"),
                    binaries.join(", ")
                );
            }
        }
    }
    Ok(0)
}

fn run_binary(command: &str, args: &[String]) -> Result<i32> {
    if command.contains('/') || command.contains('\\') {
        bail!("invalid command name '{command}': path separators are not allowed");
    }

    let root = project_root()?;
    let config = Config::load_or_default(&root.join(CONFIG_FILE_NAME))?;
    let layout = BoxLayout::new(&root);

    let mut binary_name = command.to_string();
    binary_name.push_str(std::env::consts::EXE_SUFFIX);
    let binary_path = layout.bin_dir().join(&binary_name);
    if !binary_path.exists() {
        bail!("binary {command} not found in .box/bin. Have you run 'boxkit install'?");
    }

    let scratch = tempfile::Builder::new()
        .prefix("boxkit-run-")
        .tempdir()
        .context("failed to create scratch directory")?;

    let bin_dir = layout.bin_dir();
    let scratch_path = scratch.path().display().to_string();
    let mut env = vec![
        ("PATH".to_string(), prepend_path(&bin_dir)),
        ("BOX_DIR".to_string(), layout.box_dir().display().to_string()),
        ("BOX_BIN_DIR".to_string(), bin_dir.display().to_string()),
        ("TMPDIR".to_string(), scratch_path.clone()),
        ("TEMP".to_string(), scratch_path.clone()),
        ("TMP".to_string(), scratch_path),
    ];
    for (key, value) in &config.env {
        env.push((key.clone(), value.clone()));
    }

    let sandbox = config.sandbox_enabled_for_binary(command);
    run_published_binary(&root, scratch.path(), &binary_path, args, &env, sandbox)
}

fn run_env(key: Option<&str>) -> Result<i32> {
    let cwd = project_root()?;
    let root = match find_nearest_config(&cwd) {
        Some(config_path) => config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone()),
        None => cwd,
    };
    let config = Config::load_or_default(&root.join(CONFIG_FILE_NAME))?;
    let layout = BoxLayout::new(&root);
    let env = merged_environment(&layout, &config);

    if let Some(key) = key {
        let Some(value) = env.get(key) else {
            bail!("environment variable {key} not found");
        };
        // No trailing newline so $(bx env BOX_DIR) substitutes cleanly.
        print!("{value}");
        io::stdout().flush().ok();
        return Ok(0);
    }

    for (key, value) in &env {
        println!("{key}={value}");
    }
    Ok(0)
}

pub(crate) fn merged_environment(layout: &BoxLayout, config: &Config) -> BTreeMap<String, String> {
    let bin_dir = layout.bin_dir();
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    env.insert("PATH".to_string(), prepend_path(&bin_dir));
    env.insert(
        "BOX_DIR".to_string(),
        layout.box_dir().display().to_string(),
    );
    env.insert("BOX_BIN_DIR".to_string(), bin_dir.display().to_string());
    for (key, value) in &config.env {
        env.insert(key.clone(), value.clone());
    }
    env
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

fn run_generate(target: GenerateTarget) -> Result<i32> {
    let root = project_root()?;
    let config = Config::load_or_default(&root.join(CONFIG_FILE_NAME))?;
    let (mut manager, _scratch) = new_manager(&root, config.env.clone())?;
    manager.set_output(OutputSink::Quiet);

    match target {
        GenerateTarget::Direnv => {
            manager.write_envrc()?;
            println!("{} Generated .envrc", render::check_mark());
            if let Err(err) = manager.allow_direnv() {
                println!(
                    "{} Failed to run direnv allow: {err:#}",
                    render::warn_mark()
                );
            }
        }
        GenerateTarget::Dockerfile => {
            manager.write_dockerfile()?;
            println!("{} Generated Dockerfile", render::check_mark());
        }
    }
    Ok(0)
}

pub(crate) fn doctor_commands() -> BTreeSet<&'static str> {
    let mut commands: BTreeSet<&'static str> = ToolKind::all()
        .iter()
        .map(|kind| kind.host_command())
        .collect();
    // direnv is an integration, not a tool family, but doctor covers it.
    commands.insert("direnv");
    commands
}

fn run_doctor() -> Result<i32> {
    println!("{}", render::title("Checking host package managers..."));

    let mut all_found = true;
    for command in doctor_commands() {
        match which::which(command) {
            Ok(path) => println!(
                "{} {command:<14} : {}",
                render::check_mark(),
                render::dim(&path.display().to_string())
            ),
            Err(_) => {
                println!("{} {command:<14} : Not found", render::cross_mark());
                all_found = false;
            }
        }
    }

    if all_found {
        println!("All external tools are ready.");
    } else {
        println!("Some tools are missing. Install them to use their package managers.");
    }
    Ok(0)
}
