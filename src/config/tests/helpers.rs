//! Shared fixtures and helper functions for config tests.

use crate::config::AppConfig;
use ortho_config::MergeComposer;
use rstest::fixture;
use std::sync::Arc;

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "unix:///run/podman/podman.sock"

        [repository]
        cache_dir = "/srv/vccpm/repos"
        git_binary = "/usr/local/bin/git"

        [container]
        name_prefix = "runner"
        interpreter = "python3"
        host_socket_path = "/run/podman/podman.sock"
        stop_timeout_secs = 3
        replace_stale = false

        [execution]
        timeout_secs = 12.5
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing an `AppConfig` parsed from a minimal TOML example.
#[fixture]
pub fn app_config_from_partial_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "unix:///tmp/docker.sock"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Helper: Creates a `MergeComposer` with defaults layer already pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Helper: Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Helper: Asserts that a config has all default values.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(
        config.engine_socket.is_none(),
        "engine_socket should be None"
    );
    assert_eq!(
        config.repository.cache_dir.as_str(),
        "/var/tmp/vccpm/repositories",
        "repository.cache_dir should use the shared cache"
    );
    assert_eq!(config.repository.git_binary, "git");
    assert_eq!(config.container.name_prefix, "vccpm");
    assert_eq!(config.container.interpreter, "python");
    assert_eq!(
        config.container.host_socket_path.as_str(),
        "/var/run/docker.sock"
    );
    assert_eq!(config.container.stop_timeout_secs, 10);
    assert!(config.container.replace_stale);
    assert_eq!(
        config.execution.timeout_secs.to_bits(),
        60.0_f64.to_bits(),
        "execution.timeout_secs should be 60"
    );
}
