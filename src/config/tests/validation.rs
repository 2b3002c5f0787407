//! `AppConfig` validation tests.

use rstest::rstest;

use crate::config::{AppConfig, validate_timeout_secs};
use crate::error::{ConfigError, VccpmError};

#[rstest]
fn default_config_validates() {
    assert!(AppConfig::default().validate().is_ok());
}

#[rstest]
#[case::blank_prefix("container.name_prefix")]
#[case::blank_interpreter("container.interpreter")]
#[case::blank_git("repository.git_binary")]
fn blank_required_strings_are_rejected(#[case] field: &str) {
    let mut config = AppConfig::default();
    match field {
        "container.name_prefix" => config.container.name_prefix = String::from("  "),
        "container.interpreter" => config.container.interpreter = String::new(),
        _ => config.repository.git_binary = String::from("\t"),
    }

    let result = config.validate();
    assert!(
        matches!(
            result,
            Err(VccpmError::Config(ConfigError::MissingRequired { field: ref actual }))
                if actual == field
        ),
        "expected missing {field}, got {result:?}"
    );
}

#[rstest]
#[case(0.0)]
#[case(-1.0)]
#[case(f64::NAN)]
#[case(f64::INFINITY)]
fn non_positive_or_non_finite_timeouts_are_rejected(#[case] seconds: f64) {
    let result = validate_timeout_secs("timeout", seconds);
    assert!(
        matches!(
            result,
            Err(VccpmError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "timeout"
        ),
        "expected invalid timeout for {seconds}, got {result:?}"
    );
}

#[rstest]
#[case(0.001)]
#[case(5.0)]
#[case(20.0)]
fn positive_timeouts_are_accepted(#[case] seconds: f64) {
    assert!(validate_timeout_secs("timeout", seconds).is_ok());
}

#[rstest]
fn config_with_zero_default_timeout_is_rejected() {
    let mut config = AppConfig::default();
    config.execution.timeout_secs = 0.0;
    assert!(config.validate().is_err());
}
