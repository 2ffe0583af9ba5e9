//! Tag calculation and build orchestration.
//!
//! This module provides:
//! - Build argument tables and transitive argument closures
//! - Deterministic tag calculation
//! - The build orchestrator and its per-stage records

mod args;
mod orchestrator;
mod record;
mod tag;

pub use args::{check_args, ArgClosure, BuildArgTable};
pub use orchestrator::Orchestrator;
pub use record::{BuildLevel, BuildSummary, TagRecord};
pub use tag::{calculate_tag, sanitize, LATEST, TAG_PREFIX};
