//! `vccpm` application entry point.
//!
//! This binary runs a Python script from a repository inside a throwaway
//! container. It uses `eyre` for opaque error handling at the application
//! boundary, converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/vccpm/config.toml` or path from `VCCPM_CONFIG_PATH`)
//! 3. Environment variables (`VCCPM_*`)
//! 4. Command-line arguments
//!
//! Logs go to stderr so captured script output on stdout stays clean.

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use mockable::DefaultEnv;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use vccpm::api::{RunParams, run_script};
use vccpm::config::{AppConfig, Cli, Commands, NameArgs, RunArgs, load_config};
use vccpm::error::{ContainerError, Result as VccpmResult};
use vccpm::session::{ScriptRequest, container_name};

/// Application entry point.
///
/// Installs logging, loads configuration with layered precedence via
/// `OrthoConfig`, then dispatches to the subcommand handler.
fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(&cli).map_err(Report::from)?;

    run(&cli, &config).map_err(Report::from)
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--log-level`.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Execute the CLI command, returning domain-specific errors.
fn run(cli: &Cli, config: &AppConfig) -> VccpmResult<()> {
    match &cli.command {
        Commands::Run(args) => run_command(config, args),
        Commands::Name(args) => name_command(config, args),
    }
}

/// Run a script and print its captured output.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn run_command(config: &AppConfig, args: &RunArgs) -> VccpmResult<()> {
    let timeout_secs = args.timeout.unwrap_or(config.execution.timeout_secs);
    let request = ScriptRequest::new(args.repo.as_str(), args.script.as_str(), timeout_secs)?
        .with_arguments(args.args.clone())
        .with_socket_access(args.docker_socket);

    let runtime = tokio::runtime::Runtime::new().map_err(|error| {
        ContainerError::RuntimeCreationFailed {
            message: error.to_string(),
        }
    })?;
    let env = DefaultEnv::new();
    let outcome = runtime.block_on(run_script(RunParams {
        config,
        request: &request,
        env: &env,
    }))?;

    print!("{}", outcome.output);
    Ok(())
}

/// Print the container name derived for a repository.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn name_command(config: &AppConfig, args: &NameArgs) -> VccpmResult<()> {
    let name = container_name(&config.container.name_prefix, &args.repo)?;
    println!("{name}");
    Ok(())
}
