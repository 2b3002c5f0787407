//! Unit tests for vccpm configuration types.
//!
//! This module contains tests organised into:
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Basic type and serialisation tests
//! - [`layer_precedence_tests`] - `MergeComposer` layer ordering
//! - [`validation`] - `AppConfig::validate` and timeout checks

mod helpers;
mod validation;
