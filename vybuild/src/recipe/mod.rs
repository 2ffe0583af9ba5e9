//! Recipe (Dockerfile) text handling.
//!
//! This module provides:
//! - Dependency extraction from raw recipe text
//! - Synthesis of the final multi-stage recipe handed to the build tool

mod extract;
mod synthesis;

pub use extract::{extract_dependencies, RecipeDependencies};
pub use synthesis::{synthesize, SynthesisInput, REMOVE_LABEL, STAGE_LABEL, TAG_LABEL};

/// One instruction after joining `\` continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicalLine {
    /// The joined instruction text, trimmed.
    pub text: String,
    /// Index of the first physical line the instruction spans.
    pub first_physical: usize,
    /// Index of the last physical line the instruction spans.
    pub last_physical: usize,
}

/// Splits recipe text into logical instructions.
///
/// Comment lines and blank lines are dropped, including comment lines inside
/// a continuation.
pub(crate) fn logical_lines(recipe: &str) -> Vec<LogicalLine> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut first = 0;
    let mut continuing = false;

    for (idx, raw) in recipe.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.starts_with('#') || (trimmed.is_empty() && !continuing) {
            continue;
        }

        let (content, continues) = match trimmed.strip_suffix('\\') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        if current.is_empty() {
            first = idx;
        }
        if !current.is_empty() && !content.is_empty() {
            current.push(' ');
        }
        current.push_str(content);
        continuing = continues;

        if !continuing && !current.is_empty() {
            result.push(LogicalLine {
                text: std::mem::take(&mut current),
                first_physical: first,
                last_physical: idx,
            });
        }
    }

    if !current.is_empty() {
        let last = recipe.lines().count().saturating_sub(1);
        result.push(LogicalLine {
            text: current,
            first_physical: first,
            last_physical: last,
        });
    }

    result
}

/// Returns the instruction keyword of a logical line, upper-cased.
pub(crate) fn instruction(line: &str) -> String {
    line.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}
