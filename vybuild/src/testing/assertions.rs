//! Assertions over recorded builds.

use super::RecordingRuntime;

/// Asserts that exactly `expected` builds were issued.
pub fn assert_build_count(runtime: &RecordingRuntime, expected: usize) {
    assert_eq!(
        runtime.build_count(),
        expected,
        "Expected {expected} builds, got {:?}",
        runtime.built_tags()
    );
}

/// Asserts that `first` was built strictly before `second`.
pub fn assert_built_before(runtime: &RecordingRuntime, first: &str, second: &str) {
    let tags = runtime.built_tags();
    let position = |tag: &str| tags.iter().position(|t| t == tag);
    match (position(first), position(second)) {
        (Some(a), Some(b)) => assert!(a < b, "Expected {first} before {second}, got {tags:?}"),
        _ => panic!("Expected both {first} and {second} to be built, got {tags:?}"),
    }
}

/// Asserts that `tag` was never built.
pub fn assert_not_built(runtime: &RecordingRuntime, tag: &str) {
    let tags = runtime.built_tags();
    assert!(
        !tags.iter().any(|t| t == tag),
        "Expected {tag} not to be built, got {tags:?}"
    );
}
