//! Testing utilities for build orchestration.
//!
//! This module provides:
//! - An in-memory container runtime that records every call
//! - Stage and registry fixtures
//! - Assertions over recorded builds

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_build_count, assert_built_before, assert_not_built};
pub use fixtures::{stage_record, StageFixture};
pub use mocks::RecordingRuntime;
