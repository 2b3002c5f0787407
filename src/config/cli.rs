//! Command-line argument definitions for vccpm.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for vccpm.
#[derive(Debug, Parser)]
#[command(name = "vccpm")]
#[command(
    author,
    version,
    about = "Run Python scripts from version-controlled repositories in disposable containers"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Directory holding cached repository clones.
    #[arg(long, global = true)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a Python script from a repository inside a container.
    Run(RunArgs),

    /// Print the container name derived for a repository.
    Name(NameArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Clone URL of the repository containing the script and its Dockerfile.
    #[arg(long, required = true)]
    pub repo: String,

    /// Path of the script inside the container.
    #[arg(long, required = true)]
    pub script: String,

    /// Deadline in seconds; defaults to `execution.timeout_secs`.
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Mount the host engine socket so the script can start containers.
    #[arg(long)]
    pub docker_socket: bool,

    /// Arguments passed to the script, joined with single spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the `name` subcommand.
#[derive(Debug, Parser)]
pub struct NameArgs {
    /// Clone URL of the repository.
    #[arg(long, required = true)]
    pub repo: String,
}
