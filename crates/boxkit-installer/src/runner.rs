use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use boxkit_sandbox::SandboxPolicy;

use crate::Manager;

/// Where subprocess output lines go: discarded, to stdout, or to a caller
/// callback (the interactive display shows the most recent line).
pub enum OutputSink {
    Quiet,
    Stdout,
    Callback(Box<dyn Fn(&str) + Send + Sync>),
}

impl OutputSink {
    pub fn line(&self, line: &str) {
        match self {
            Self::Quiet => {}
            Self::Stdout => println!("{line}"),
            Self::Callback(callback) => callback(line),
        }
    }
}

/// One subprocess invocation through the command runner: program, argument
/// list, environment adjustments, working directory, and whether the
/// sandbox applier wraps it.
pub(crate) struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub env_remove: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub sandbox: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            env_remove: Vec::new(),
            current_dir: None,
            sandbox: false,
        }
    }
}

impl Manager {
    /// Runs an installer subprocess synchronously, streaming its combined
    /// output line-by-line to the manager's sink. Nonzero exit or spawn
    /// failure is an error; there is no timeout — a hung installer blocks.
    pub(crate) fn run_installer(&self, invocation: Invocation) -> Result<()> {
        let (program, args) = if invocation.sandbox {
            let policy = SandboxPolicy::new(self.root(), self.scratch_dir());
            policy.apply(&invocation.program, &invocation.args)
        } else {
            (invocation.program.clone(), invocation.args.clone())
        };

        self.log(&format!("Running: {} {}", program, args.join(" ")));

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }
        for key in &invocation.env_remove {
            command.env_remove(key);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start installer command: {program}"))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        std::thread::scope(|scope| {
            if let Some(stdout) = stdout {
                scope.spawn(|| forward_lines(stdout, self.output()));
            }
            if let Some(stderr) = stderr {
                scope.spawn(|| forward_lines(stderr, self.output()));
            }
        });

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for installer command: {program}"))?;
        if !status.success() {
            bail!("installer command '{program}' failed: {status}");
        }
        Ok(())
    }
}

fn forward_lines(reader: impl Read, sink: &OutputSink) {
    for line in BufReader::new(reader).lines().map_while(Result::ok) {
        let trimmed = line.trim_end();
        if !trimmed.is_empty() {
            sink.line(trimmed);
        }
    }
}

/// Executes a published binary with inherited stdio and returns its exit
/// code for the caller to propagate as its own process status.
pub fn run_published_binary(
    root: &Path,
    scratch_dir: &Path,
    binary_path: &Path,
    args: &[String],
    env: &[(String, String)],
    sandbox: bool,
) -> Result<i32> {
    let program = binary_path.to_string_lossy().into_owned();
    let (program, args) = if sandbox {
        SandboxPolicy::new(root, scratch_dir).apply(&program, args)
    } else {
        (program, args.to_vec())
    };

    let mut command = Command::new(&program);
    command.args(&args);
    for (key, value) in env {
        command.env(key, value);
    }

    let status = command
        .status()
        .with_context(|| format!("failed to execute {}", binary_path.display()))?;
    Ok(status.code().unwrap_or(1))
}
