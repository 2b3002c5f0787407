//! Configuration data types for vccpm.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Local repository cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory holding one working copy per cloned project.
    pub cache_dir: Utf8PathBuf,

    /// The `git` executable used for clone and commit queries.
    pub git_binary: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_dir: Utf8PathBuf::from("/var/tmp/vccpm/repositories"),
            git_binary: String::from("git"),
        }
    }
}

/// Container naming and lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Prefix joined to the lower-cased project name with an underscore.
    pub name_prefix: String,

    /// Interpreter invoked for the script inside the container.
    pub interpreter: String,

    /// Host path of the engine socket mounted when socket access is granted.
    pub host_socket_path: Utf8PathBuf,

    /// Grace period given to the container on stop before it is killed.
    pub stop_timeout_secs: u64,

    /// Force-remove a leftover container with the derived name before create.
    pub replace_stale: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name_prefix: String::from("vccpm"),
            interpreter: String::from("python"),
            host_socket_path: Utf8PathBuf::from("/var/run/docker.sock"),
            stop_timeout_secs: 10,
            replace_stale: true,
        }
    }
}

/// Script execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Default deadline in seconds when the command line does not give one.
    pub timeout_secs: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { timeout_secs: 60.0 }
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `VCCPM_CONFIG_PATH` environment variable
/// 2. `.vccpm.toml` in the current working directory
/// 3. `.vccpm.toml` in the home directory
/// 4. `~/.config/vccpm/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "VCCPM",
    post_merge_hook,
    discovery(
        app_name = "vccpm",
        env_var = "VCCPM_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".vccpm.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// Repository cache configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub repository: RepositoryConfig,

    /// Container configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub container: ContainerConfig,

    /// Execution configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub execution: ExecutionConfig,
}

impl AppConfig {
    /// Validates values that cannot be expressed through types alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when a required string is blank
    /// and `ConfigError::InvalidValue` when the default timeout is not a
    /// finite positive number.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("repository.git_binary", &self.repository.git_binary),
            ("container.name_prefix", &self.container.name_prefix),
            ("container.interpreter", &self.container.interpreter),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: String::from(field),
                }
                .into());
            }
        }

        validate_timeout_secs("execution.timeout_secs", self.execution.timeout_secs)
    }
}

/// Checks that a deadline in seconds is finite and strictly positive.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` naming `field` otherwise.
pub fn validate_timeout_secs(field: &str, seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds > 0.0 {
        return Ok(());
    }

    Err(ConfigError::InvalidValue {
        field: String::from(field),
        reason: format!("must be a finite number of seconds greater than zero, got {seconds}"),
    }
    .into())
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Image tags must be lower case, so the prefix is normalised once here.
        self.container.name_prefix = self.container.name_prefix.trim().to_lowercase();
        Ok(())
    }
}
