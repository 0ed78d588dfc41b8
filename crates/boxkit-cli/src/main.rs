use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

mod dispatch;
mod render;


#[derive(Parser, Debug)]
#[command(name = "boxkit")]
#[command(version)]
#[command(about = "Project-local toolbox: install developer tools into ./.box", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the tools declared in box.yml
    Install {
        /// Configuration file to use
        #[arg(short = 'f', long, default_value = "box.yml")]
        file: PathBuf,
        /// Run without the interactive progress display (no TTY required)
        #[arg(short = 'y', long)]
        non_interactive: bool,
    },
    /// Add a tool to box.yml
    Add {
        /// Tool type: go, npm, cargo, uv, gem, or script
        kind: String,
        /// Package source, optionally with a version (source@version)
        spec: String,
        /// Extra arguments passed to the package manager
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Remove an installed tool and the files it owns
    Uninstall { name: String },
    /// List configured tools and their published binaries
    List,
    /// Execute a published binary from .box/bin
    Run {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Display the merged environment, or a single variable
    Env { key: Option<String> },
    /// Generate integration files
    Generate {
        #[arg(value_enum)]
        target: GenerateTarget,
    },
    /// Check that the host package managers are installed
    Doctor,
    /// Write a shell completion script to stdout
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum GenerateTarget {
    Direnv,
    Dockerfile,
}

fn main() {
    let cli = Cli::parse();
    match dispatch::run_cli(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {err:#}", render::cross_mark());
            std::process::exit(1);
        }
    }
}
