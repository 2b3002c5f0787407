//! Unit tests for project name derivation.

use rstest::rstest;

use super::project_name_from_url;
use crate::error::{RepositoryError, VccpmError};

#[rstest]
#[case::https_git("https://github.com/AustinHellerRepo/TestDockerTimeDelay.git", "TestDockerTimeDelay")]
#[case::https_plain("https://example.com/owner/project", "project")]
#[case::trailing_slash("https://example.com/owner/project/", "project")]
#[case::scp_style("git@github.com:owner/Tool.git", "Tool")]
#[case::scp_no_owner("host:project.git", "project")]
#[case::local_path("/srv/git/scripts.git", "scripts")]
#[case::bare_name("scripts", "scripts")]
fn project_name_is_last_segment_without_git_suffix(#[case] url: &str, #[case] expected: &str) {
    let name = project_name_from_url(url).expect("project name should be derived");
    assert_eq!(name, expected);
}

#[rstest]
#[case::empty("")]
#[case::only_slashes("///")]
#[case::only_suffix("https://example.com/owner/.git")]
#[case::host_only("git@github.com:")]
fn urls_without_a_project_name_are_rejected(#[case] url: &str) {
    let result = project_name_from_url(url);
    assert!(
        matches!(
            result,
            Err(VccpmError::Repository(RepositoryError::InvalidUrl { .. }))
        ),
        "expected InvalidUrl for {url:?}, got {result:?}"
    );
}
