//! Run Python scripts from version-controlled repositories in disposable
//! containers under a deadline.
//!
//! `vccpm` resolves a clone URL to an up-to-date local working copy, builds
//! the repository's `Dockerfile` into an image, starts a container named after
//! the project, and runs one script inside it. A background worker waits for
//! the script and captures its stdout while the caller holds a session that
//! reports success or a typed timeout. Sessions are always torn down: the
//! container is stopped and removed and the image deleted.
//!
//! # Modules
//!
//! - [`api`]: Library orchestration for the CLI and embedders
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Container engine connection and the Docker-backed runtime
//! - [`error`]: Semantic error types for the application
//! - [`repository`]: Clone, reuse, or refresh of repository working copies
//! - [`session`]: Deadline-guarded execution sessions

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod repository;
pub mod session;
