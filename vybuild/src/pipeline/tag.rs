//! Deterministic image tags.
//!
//! A tag is a pure function of the stage name and the values of the
//! arguments relevant to it:
//!
//! ```text
//! vy__<lowercased-sanitized-stage-name>:<KEY.VALUE fragments sorted by key, joined with '.', or "latest">
//! ```
//!
//! Equal inputs always produce byte-identical tags, which is what lets a
//! previously built image be recognized and reused.

use super::BuildArgTable;
use crate::stages::StageName;
use std::collections::BTreeSet;

/// Prefix shared by every tag this crate produces.
pub const TAG_PREFIX: &str = "vy__";

/// Tag suffix used when no relevant argument has a value.
pub const LATEST: &str = "latest";

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Computes the tag of `stage` over `relevant_keys`.
///
/// Keys are sorted and de-duplicated; keys without a non-empty value in
/// `table` contribute nothing.
#[must_use]
pub fn calculate_tag<'k>(
    stage: &StageName,
    relevant_keys: impl IntoIterator<Item = &'k str>,
    table: &BuildArgTable,
) -> String {
    let keys: BTreeSet<&str> = relevant_keys.into_iter().collect();
    let fragments: Vec<String> = keys
        .into_iter()
        .filter_map(|key| {
            table
                .get(key)
                .map(|value| format!("{}.{}", sanitize(key), sanitize(value)))
        })
        .collect();

    let suffix = if fragments.is_empty() {
        LATEST.to_string()
    } else {
        fragments.join(".")
    };

    format!("{TAG_PREFIX}{}:{suffix}", sanitize(stage.key()))
}
