//! Configuration system for vccpm.
//!
//! This module provides the configuration structures and CLI definitions for the
//! vccpm application. Configuration loading and precedence merging is handled by
//! the `ortho_config` crate. Precedence: CLI flags override environment
//! variables, which override configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/vccpm/config.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///var/run/docker.sock"
//!
//! [repository]
//! cache_dir = "/var/tmp/vccpm/repositories"
//! git_binary = "git"
//!
//! [container]
//! name_prefix = "vccpm"
//! interpreter = "python"
//! host_socket_path = "/var/run/docker.sock"
//! stop_timeout_secs = 10
//! replace_stale = true
//!
//! [execution]
//! timeout_secs = 60.0
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, NameArgs, RunArgs};
pub use loader::{env_var_names, load_config};
pub use types::{
    AppConfig, ContainerConfig, ExecutionConfig, RepositoryConfig, validate_timeout_secs,
};
