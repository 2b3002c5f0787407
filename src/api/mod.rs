//! Orchestration API for vccpm commands.
//!
//! [`run_script`] wires the production collaborators (git CLI repository
//! cache, Docker-backed runtime) from an [`crate::config::AppConfig`] and runs
//! one scoped session. It does not print or exit; the CLI adapter owns both.

mod run;

pub use run::{RunParams, execute_script, run_script};

/// Outcome of a script run that finished before its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// Captured stdout of the script, decoded as UTF-8.
    pub output: String,
}
