//! Configuration loading with layered precedence.
//!
//! Layers, lowest to highest: application defaults, configuration file,
//! `VCCPM_*` environment variables, command-line flags. They are composed by
//! hand with `MergeComposer` because `Cli` owns subcommand dispatch and
//! `--config`, while `AppConfig` only holds values.
//!
//! Typed environment variables (`VCCPM_CONTAINER_REPLACE_STALE`,
//! `VCCPM_CONTAINER_STOP_TIMEOUT_SECS`, `VCCPM_EXECUTION_TIMEOUT_SECS`) must
//! parse or loading fails naming the variable. String variables are taken
//! verbatim.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// How a raw environment value becomes JSON.
#[derive(Clone, Copy)]
enum Kind {
    Text,
    Flag,
    Count,
    Seconds,
}

/// `(variable, section, field, kind)`; an empty section means a top-level
/// field.
const ENV_FIELDS: &[(&str, &str, &str, Kind)] = &[
    ("VCCPM_ENGINE_SOCKET", "", "engine_socket", Kind::Text),
    ("VCCPM_REPOSITORY_CACHE_DIR", "repository", "cache_dir", Kind::Text),
    ("VCCPM_REPOSITORY_GIT_BINARY", "repository", "git_binary", Kind::Text),
    ("VCCPM_CONTAINER_NAME_PREFIX", "container", "name_prefix", Kind::Text),
    ("VCCPM_CONTAINER_INTERPRETER", "container", "interpreter", Kind::Text),
    (
        "VCCPM_CONTAINER_HOST_SOCKET_PATH",
        "container",
        "host_socket_path",
        Kind::Text,
    ),
    (
        "VCCPM_CONTAINER_STOP_TIMEOUT_SECS",
        "container",
        "stop_timeout_secs",
        Kind::Count,
    ),
    (
        "VCCPM_CONTAINER_REPLACE_STALE",
        "container",
        "replace_stale",
        Kind::Flag,
    ),
    (
        "VCCPM_EXECUTION_TIMEOUT_SECS",
        "execution",
        "timeout_secs",
        Kind::Seconds,
    ),
];

/// Return every environment variable the loader reads.
///
/// Tests use this to clear the `VCCPM_*` environment without repeating the
/// list.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_FIELDS.iter().map(|&(variable, ..)| variable).collect()
}

/// Load configuration from defaults, file, environment, and `cli`.
///
/// The file is `cli.config` when that path exists, otherwise the first
/// existing candidate from `VCCPM_CONFIG_PATH`, `.vccpm.toml` in the working
/// or home directory, or `~/.config/vccpm/config.toml`.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for an unreadable or malformed file,
/// `ConfigError::InvalidValue` for an unparseable typed environment variable
/// or a rejected timeout, `ConfigError::MissingRequired` for a blank required
/// string, and `ConfigError::OrthoConfig` when merging fails.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults = serde_json::to_value(AppConfig::default()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        }
    })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_file(cli) {
        tracing::debug!(%path, "loading configuration file");
        composer.push_file(read_config_file(&path)?, Some(path));
    }

    let environment = env_layer(|variable| std::env::var(variable).ok())?;
    if !environment.is_empty() {
        composer.push_environment(Value::Object(environment));
    }

    let overrides = cli_layer(cli);
    if !overrides.is_empty() {
        composer.push_cli(Value::Object(overrides));
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;
    Ok(config)
}

fn config_file(cli: &Cli) -> Option<Utf8PathBuf> {
    if let Some(explicit) = cli.config.as_ref().filter(|path| path.exists()) {
        return Some(explicit.clone());
    }

    ConfigDiscovery::builder("vccpm")
        .env_var("VCCPM_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".vccpm.toml")
        .build()
        .candidates()
        .into_iter()
        .filter(|candidate| candidate.exists())
        .find_map(|candidate| Utf8PathBuf::try_from(candidate).ok())
}

/// Read and parse a TOML file through a capability handle on its directory.
fn read_config_file(path: &Utf8Path) -> Result<Value> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());

    let content = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name))
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    toml::from_str(&content).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        }
        .into()
    })
}

fn parse_env_value(variable: &str, raw: String, kind: Kind) -> Result<Value> {
    let invalid = |expected: &str, got: &str| ConfigError::InvalidValue {
        field: String::from(variable),
        reason: format!("expected {expected}, got '{got}'"),
    };

    let value = match kind {
        Kind::Text => Value::String(raw),
        Kind::Flag => raw
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| invalid("bool (true/false)", &raw))?,
        Kind::Count => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| invalid("unsigned integer", &raw))?,
        Kind::Seconds => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("a finite number", &raw))?,
    };
    Ok(value)
}

/// Build the environment layer from `lookup`, skipping unset variables.
fn env_layer(lookup: impl Fn(&str) -> Option<String>) -> Result<Map<String, Value>> {
    let mut layer = Map::new();
    for &(variable, section, field, kind) in ENV_FIELDS {
        if let Some(raw) = lookup(variable) {
            let value = parse_env_value(variable, raw, kind)?;
            insert_field(&mut layer, section, field, value);
        }
    }
    Ok(layer)
}

fn insert_field(layer: &mut Map<String, Value>, section: &str, field: &str, value: Value) {
    if section.is_empty() {
        layer.insert(String::from(field), value);
        return;
    }

    let entry = layer
        .entry(String::from(section))
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(table) = entry.as_object_mut() {
        table.insert(String::from(field), value);
    }
}

fn cli_layer(cli: &Cli) -> Map<String, Value> {
    let mut layer = Map::new();
    if let Some(socket) = &cli.engine_socket {
        insert_field(&mut layer, "", "engine_socket", Value::from(socket.as_str()));
    }
    if let Some(cache_dir) = &cli.cache_dir {
        insert_field(&mut layer, "repository", "cache_dir", Value::from(cache_dir.as_str()));
    }
    layer
}
