//! Behavioural test helpers for script sessions.
//!
//! Scenarios drive a [`ScriptRunner`] over in-memory doubles on a paused
//! Tokio clock, so deadlines of many seconds elapse instantly.

mod fakes;
mod steps;

use std::time::Duration;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use vccpm::config::ContainerConfig;
use vccpm::session::{ScriptRequest, ScriptRunner};

pub use fakes::{CountingManager, ScriptBehaviour, ScriptedFactory};
#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub use steps::*;

/// Repository used by every scenario.
pub const REPOSITORY_URL: &str = "https://github.com/example/TestDockerTimeDelay.git";

/// Script path inside the container.
pub const SCRIPT: &str = "main.py";

/// Stdout of a script that found nothing and raised nothing.
pub const EMPTY_DATA_REPORT: &str = "{ \"data\": [ ], \"exception\": null }\n";

/// What one run observed.
#[derive(Clone, Debug, Default)]
pub struct RunOutcome {
    /// The first wait succeeded.
    pub completed: bool,
    /// Decoded stdout, when any was captured.
    pub output: Option<String>,
    /// Error from starting or waiting.
    pub error: Option<String>,
    /// Error from a second wait issued after the first.
    pub late_error: Option<String>,
}

/// State shared across script session scenarios.
#[derive(Default, ScenarioState)]
pub struct ScriptSessionState {
    /// Behaviour of the fake script.
    pub behaviour: Slot<ScriptBehaviour>,
    /// Deadline in seconds.
    pub timeout_secs: Slot<f64>,
    /// Arguments passed to the script.
    pub arguments: Slot<Vec<String>>,
    /// Outcome of the last run.
    pub outcome: Slot<RunOutcome>,
    /// Engine calls made across all runs.
    pub events: Slot<Vec<String>>,
    /// Number of repository clones performed.
    pub clones: Slot<usize>,
}

/// Fixture providing a fresh script session state.
#[fixture]
pub fn script_session_state() -> ScriptSessionState {
    let state = ScriptSessionState::default();
    state.timeout_secs.set(20.0);
    state.arguments.set(Vec::new());
    state
}

/// Build the request described by the scenario state.
///
/// # Panics
///
/// Panics when the scenario configured an invalid timeout.
#[expect(
    clippy::expect_used,
    reason = "test helper - an invalid scenario setup should fail loudly"
)]
#[must_use]
pub fn request_from(state: &ScriptSessionState) -> ScriptRequest {
    let timeout_secs = state.timeout_secs.get().unwrap_or(20.0);
    ScriptRequest::new(REPOSITORY_URL, SCRIPT, timeout_secs)
        .expect("scenario request should be valid")
        .with_arguments(state.arguments.get().unwrap_or_default())
}

/// Runner type used by the scenarios.
pub type ScenarioRunner = ScriptRunner<CountingManager, ScriptedFactory>;

/// Build a runner over `manager` and `factory` with default container settings.
#[must_use]
pub fn runner(manager: &CountingManager, factory: &ScriptedFactory) -> ScenarioRunner {
    ScriptRunner::new(manager.clone(), factory.clone(), &ContainerConfig::default())
}

/// Start one session, wait on it, optionally wait again after `late_after`,
/// and dispose it.
///
/// # Panics
///
/// Panics when disposal fails.
#[expect(
    clippy::expect_used,
    reason = "test helper - a failed disposal should fail the scenario"
)]
pub async fn run_once(
    runner: &ScenarioRunner,
    request: &ScriptRequest,
    late_after: Option<Duration>,
) -> RunOutcome {
    let mut session = match runner.run_python_script(request).await {
        Ok(session) => session,
        Err(error) => {
            return RunOutcome {
                error: Some(error.to_string()),
                ..RunOutcome::default()
            };
        }
    };

    let waited = session.wait().await;
    let mut late_error = None;
    if let Some(delay) = late_after {
        tokio::time::sleep(delay).await;
        late_error = session.wait().await.err().map(|error| error.to_string());
    }
    let output = session
        .output_text()
        .ok()
        .flatten()
        .map(String::from);
    session.dispose().await.expect("dispose should succeed");

    RunOutcome {
        completed: waited.is_ok(),
        output,
        error: waited.err().map(|error| error.to_string()),
        late_error,
    }
}

/// Build a current-thread runtime with the clock paused.
///
/// # Panics
///
/// Panics when the runtime cannot be created.
#[expect(
    clippy::expect_used,
    reason = "test helper - runtime creation failure should fail the scenario"
)]
#[must_use]
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("test runtime should build")
}
