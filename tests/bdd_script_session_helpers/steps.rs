//! Step definitions for script session scenarios.

use std::sync::PoisonError;
use std::time::Duration;

use rstest_bdd_macros::{given, then, when};

use super::{
    CountingManager, EMPTY_DATA_REPORT, RunOutcome, ScriptBehaviour, ScriptSessionState, ScriptedFactory,
    paused_runtime, request_from, run_once, runner,
};

fn behaviour(state: &ScriptSessionState) -> ScriptBehaviour {
    state.behaviour.get().unwrap_or_default()
}

fn record_engine_calls(state: &ScriptSessionState, factory: &ScriptedFactory) {
    let events = factory
        .events
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    state.events.set(events);
}

#[expect(
    clippy::expect_used,
    reason = "test assertion - panic on missing state is intentional"
)]
fn outcome(state: &ScriptSessionState) -> RunOutcome {
    state
        .outcome
        .get()
        .expect("a run should happen before checking its outcome")
}

fn engine_calls(state: &ScriptSessionState) -> Vec<String> {
    state.events.get().unwrap_or_default()
}

// =============================================================================
// Given step definitions
// =============================================================================

fn script_output(state: &ScriptSessionState, stdout: String, seconds: u64) {
    let current = behaviour(state);
    state.behaviour.set(ScriptBehaviour {
        stdout,
        run_for: Duration::from_secs(seconds),
        ..current
    });
}

#[given("a script that prints {text} after {seconds} seconds")]
fn script_prints_after(script_session_state: &ScriptSessionState, text: String, seconds: u64) {
    script_output(script_session_state, text, seconds);
}

#[given("a script that reports empty data after {seconds} seconds")]
fn script_reports_empty_data(script_session_state: &ScriptSessionState, seconds: u64) {
    script_output(script_session_state, String::from(EMPTY_DATA_REPORT), seconds);
}

#[given("a timeout of {seconds} seconds")]
fn timeout_of(script_session_state: &ScriptSessionState, seconds: f64) {
    script_session_state.timeout_secs.set(seconds);
}

#[given("the script is given the arguments {arguments}")]
fn script_arguments(script_session_state: &ScriptSessionState, arguments: String) {
    script_session_state
        .arguments
        .set(arguments.split_whitespace().map(String::from).collect());
}

#[given("the container fails to start")]
fn container_fails_to_start(script_session_state: &ScriptSessionState) {
    let current = behaviour(script_session_state);
    script_session_state.behaviour.set(ScriptBehaviour {
        fail_start: true,
        ..current
    });
}

// =============================================================================
// When step definitions
// =============================================================================

fn run_scenario(
    state: &ScriptSessionState,
    late_after: Option<Duration>,
    runs: usize,
    move_remote: bool,
) {
    let manager = CountingManager::default();
    let factory = ScriptedFactory {
        behaviour: behaviour(state),
        ..ScriptedFactory::default()
    };
    let script_runner = runner(&manager, &factory);
    let request = request_from(state);

    let last = paused_runtime().block_on(async {
        let mut latest = RunOutcome::default();
        for run in 0..runs {
            if move_remote && run > 0 {
                manager.move_remote();
            }
            latest = run_once(&script_runner, &request, late_after).await;
        }
        latest
    });

    state.outcome.set(last);
    state.clones.set(manager.clones());
    record_engine_calls(state, &factory);
}

#[when("the script is run")]
fn script_is_run(script_session_state: &ScriptSessionState) {
    run_scenario(script_session_state, None, 1, false);
}

#[when("the script is run and checked again after {seconds} seconds")]
fn script_is_run_and_checked_late(script_session_state: &ScriptSessionState, seconds: u64) {
    run_scenario(
        script_session_state,
        Some(Duration::from_secs(seconds)),
        1,
        false,
    );
}

#[when("the script is run twice")]
fn script_is_run_twice(script_session_state: &ScriptSessionState) {
    run_scenario(script_session_state, None, 2, false);
}

#[when("the script is run again after the remote moved")]
fn script_is_run_after_remote_moved(script_session_state: &ScriptSessionState) {
    run_scenario(script_session_state, None, 2, true);
}

// =============================================================================
// Then step definitions
// =============================================================================

#[then("the run completes")]
fn run_completes(script_session_state: &ScriptSessionState) {
    let observed = outcome(script_session_state);
    assert!(observed.completed, "expected completion, got {:?}", observed.error);
}

#[then("the run times out after {seconds} seconds")]
fn run_times_out(script_session_state: &ScriptSessionState, seconds: String) {
    let observed = outcome(script_session_state);
    assert!(!observed.completed);
    assert_eq!(
        observed.error,
        Some(format!("script execution timed out after {seconds} seconds"))
    );
}

#[then("the late check also times out")]
fn late_check_times_out(script_session_state: &ScriptSessionState) {
    let observed = outcome(script_session_state);
    assert_eq!(observed.late_error, observed.error);
    assert!(observed.late_error.is_some());
}

#[then("no output is captured")]
fn no_output_is_captured(script_session_state: &ScriptSessionState) {
    assert_eq!(outcome(script_session_state).output, None);
}

#[then("the run fails with {message}")]
fn run_fails_with(script_session_state: &ScriptSessionState, message: String) {
    let observed = outcome(script_session_state);
    let error = observed.error.unwrap_or_default();
    assert!(
        error.contains(&message),
        "expected error to mention '{message}', got '{error}'"
    );
}

#[then("the command {command} is issued")]
fn command_is_issued(script_session_state: &ScriptSessionState, command: String) {
    let expected = format!("execute {command}");
    assert!(
        engine_calls(script_session_state).contains(&expected),
        "expected '{expected}' in {:?}",
        engine_calls(script_session_state)
    );
}

#[then("no command is issued")]
fn no_command_is_issued(script_session_state: &ScriptSessionState) {
    assert!(
        !engine_calls(script_session_state)
            .iter()
            .any(|event| event.starts_with("execute")),
    );
}

#[then("the container is started as {name}")]
fn container_is_started_as(script_session_state: &ScriptSessionState, name: String) {
    let prefix = format!("start {name} from ");
    assert!(
        engine_calls(script_session_state)
            .iter()
            .any(|event| event.starts_with(&prefix)),
    );
}

#[then("the container is stopped and removed")]
fn container_is_stopped_and_removed(script_session_state: &ScriptSessionState) {
    let calls = engine_calls(script_session_state);
    let stop = calls.iter().position(|event| event == "stop");
    let remove = calls.iter().position(|event| event == "remove");
    assert!(stop.is_some() && stop < remove, "unexpected calls {calls:?}");
}

#[then("the image is released")]
fn image_is_released(script_session_state: &ScriptSessionState) {
    assert_eq!(
        engine_calls(script_session_state).last().map(String::as_str),
        Some("release image")
    );
}

#[then("the repository is cloned {count} times")]
fn repository_is_cloned(script_session_state: &ScriptSessionState, count: usize) {
    assert_eq!(script_session_state.clones.get(), Some(count));
}
