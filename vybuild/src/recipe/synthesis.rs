//! Synthesis of the final multi-stage recipe.

use super::{instruction, logical_lines};
use crate::stages::{StageName, StageRecord};
use std::collections::HashSet;
use std::fmt::Write;

/// Label recording the tag of a final stage image.
pub const TAG_LABEL: &str = "vy.tag";
/// Label marking throwaway intermediate images (`"1"`) for bulk removal.
pub const REMOVE_LABEL: &str = "vy.remove";
/// Label recording which stage produced an intermediate image.
pub const STAGE_LABEL: &str = "vy.stage";

/// Everything needed to synthesize one stage's recipe.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    /// The stage being built.
    pub stage: &'a StageRecord,
    /// The tag the final image will carry.
    pub tag: &'a str,
    /// Relevant argument values, burned in as `ARG` lines.
    pub args: &'a [(String, String)],
    /// Each dependency with the tag of its already built image.
    pub dependencies: &'a [(StageName, String)],
}

/// Produces the recipe text handed to the build tool.
///
/// The output is: one `ARG` line per relevant argument, the global
/// preamble of the stage's recipe (everything before its first `FROM`), one
/// `FROM <tag> AS <dependency>` line per dependency, the rest of the recipe
/// with a removal marker injected after each of its `FROM` instructions, and
/// a final label carrying the stage's tag.
#[must_use]
pub fn synthesize(input: &SynthesisInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# vybuild: stage {} as {}", input.stage.name(), input.tag);

    for (key, value) in input.args {
        let _ = writeln!(out, "ARG {key}=\"{}\"", escape(value));
    }

    let logical = logical_lines(input.stage.body());
    let froms: Vec<_> = logical
        .iter()
        .filter(|line| instruction(&line.text) == "FROM")
        .collect();
    // Lines before the first FROM are global scope and must stay ahead of
    // every stage, including the dependency aliases.
    let preamble_end = froms.first().map_or(0, |line| line.first_physical);
    let from_ends: HashSet<usize> = froms.iter().map(|line| line.last_physical).collect();
    let marker = format!(
        "LABEL {REMOVE_LABEL}=\"1\" {STAGE_LABEL}=\"{}\"",
        escape(input.stage.name().key())
    );

    let body: Vec<&str> = input.stage.body().lines().collect();
    for line in &body[..preamble_end] {
        out.push_str(line);
        out.push('\n');
    }
    for (dep, tag) in input.dependencies {
        let _ = writeln!(out, "FROM {tag} AS {dep}");
    }
    for (idx, line) in body.iter().enumerate().skip(preamble_end) {
        out.push_str(line);
        out.push('\n');
        if from_ends.contains(&idx) {
            out.push_str(&marker);
            out.push('\n');
        }
    }

    let _ = writeln!(
        out,
        "LABEL {REMOVE_LABEL}=\"0\" {TAG_LABEL}=\"{}\"",
        escape(input.tag)
    );
    out
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(body: &str) -> StageRecord {
        StageRecord::builder("App")
            .build_context(std::env::temp_dir())
            .depends_on("base")
            .body(body)
            .build()
            .unwrap()
    }

    #[test]
    fn test_synthesized_layout() {
        let stage = record("FROM base\nARG FOO\nCOPY --from=base /a /a\n");
        let args = vec![("FOO".to_string(), "baz".to_string())];
        let deps = vec![(StageName::new("base"), "vy__base:FOO.baz".to_string())];

        let text = synthesize(&SynthesisInput {
            stage: &stage,
            tag: "vy__app:FOO.baz",
            args: &args,
            dependencies: &deps,
        });

        let expected = "\
# vybuild: stage App as vy__app:FOO.baz
ARG FOO=\"baz\"
FROM vy__base:FOO.baz AS base
FROM base
LABEL vy.remove=\"1\" vy.stage=\"app\"
ARG FOO
COPY --from=base /a /a
LABEL vy.remove=\"0\" vy.tag=\"vy__app:FOO.baz\"
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_marker_after_every_from_and_continuation() {
        let stage = record("FROM golang \\\n  AS build\nRUN go build\n\nfrom alpine\nCOPY --from=build /app /app\n");

        let text = synthesize(&SynthesisInput {
            stage: &stage,
            tag: "vy__app:latest",
            args: &[],
            dependencies: &[],
        });

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "FROM golang \\");
        assert_eq!(lines[2], "  AS build");
        assert!(lines[3].starts_with("LABEL vy.remove=\"1\""));
        assert_eq!(lines[6], "from alpine");
        assert!(lines[7].starts_with("LABEL vy.remove=\"1\""));
        assert_eq!(text.matches("vy.remove=\"1\"").count(), 2);
        assert!(text.ends_with("LABEL vy.remove=\"0\" vy.tag=\"vy__app:latest\"\n"));
    }

    #[test]
    fn test_argument_values_are_escaped() {
        let stage = record("FROM base\n");
        let args = vec![("MSG".to_string(), "say \"hi\" $HOME".to_string())];

        let text = synthesize(&SynthesisInput {
            stage: &stage,
            tag: "vy__app:latest",
            args: &args,
            dependencies: &[],
        });

        assert!(text.contains("ARG MSG=\"say \\\"hi\\\" \\$HOME\"\n"));
    }

    #[test]
    fn test_global_args_stay_ahead_of_dependency_stages() {
        let stage = record("# base image version\nARG ALPINE=3.19\nFROM alpine:${ALPINE}\nCOPY --from=base /a /a\n");
        let deps = vec![(StageName::new("base"), "vy__base:latest".to_string())];

        let text = synthesize(&SynthesisInput {
            stage: &stage,
            tag: "vy__app:latest",
            args: &[],
            dependencies: &deps,
        });

        let expected = "\
# vybuild: stage App as vy__app:latest
# base image version
ARG ALPINE=3.19
FROM vy__base:latest AS base
FROM alpine:${ALPINE}
LABEL vy.remove=\"1\" vy.stage=\"app\"
COPY --from=base /a /a
LABEL vy.remove=\"0\" vy.tag=\"vy__app:latest\"
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_body_without_from_is_kept_after_dependencies() {
        let stage = record("ARG X\nRUN true\n");
        let deps = vec![(StageName::new("base"), "vy__base:latest".to_string())];

        let text = synthesize(&SynthesisInput {
            stage: &stage,
            tag: "vy__app:latest",
            args: &[],
            dependencies: &deps,
        });

        assert!(text.contains("FROM vy__base:latest AS base\nARG X\nRUN true\n"));
    }
}
