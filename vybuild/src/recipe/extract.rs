//! Dependency extraction from recipe text.
//!
//! Finds references to other locally buildable stages (`FROM <stage>` and
//! `COPY --from=<stage>`), the build arguments the recipe declares, and the
//! secret ids it mounts. Extraction is a pure function over text so it can be
//! tested without touching the filesystem or the runtime.

use super::{instruction, logical_lines};
use crate::stages::StageName;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Result of scanning one recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDependencies {
    /// Referenced local stages, de-duplicated, in first-reference order.
    pub dependencies: Vec<StageName>,
    /// Declared arguments with their defaults, first declaration wins.
    pub declared_args: Vec<(String, Option<String>)>,
    /// Secret ids mounted by `RUN --mount=type=secret`.
    pub secrets: Vec<String>,
}

impl RecipeDependencies {
    fn add_dependency(&mut self, name: StageName) {
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    fn add_arg(&mut self, key: &str, default: Option<String>) {
        if !self.declared_args.iter().any(|(k, _)| k == key) {
            self.declared_args.push((key.to_string(), default));
        }
    }

    fn add_secret(&mut self, id: &str) {
        if !self.secrets.iter().any(|s| s == id) {
            self.secrets.push(id.to_string());
        }
    }
}

#[allow(clippy::expect_used)]
static FROM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^FROM\s+(?:--\S+\s+)*(\S+)(?:\s+AS\s+(\S+))?\s*$")
        .expect("FROM pattern is valid")
});

#[allow(clippy::expect_used)]
static COPY_FROM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^COPY\s(?:.*\s)?--from=["']?([^\s"']+)"#).expect("COPY pattern is valid")
});

#[allow(clippy::expect_used)]
static ARG_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)(?:=("[^"]*"|'[^']*'|\S*))?"#)
        .expect("ARG pattern is valid")
});

#[allow(clippy::expect_used)]
static MOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--mount=(\S+)").expect("mount pattern is valid"));

/// Tracks which names a recipe reference may resolve to.
struct References<'a> {
    stage: &'a StageName,
    local_stages: &'a HashSet<StageName>,
    aliases: HashSet<StageName>,
}

impl References<'_> {
    /// Returns the local stage `reference` names, if it is one.
    ///
    /// Aliases declared earlier in the recipe shadow registry stages, and a
    /// stage never depends on itself: `FROM nginx` in the `nginx` recipe is
    /// the upstream image.
    fn local(&self, reference: &str) -> Option<StageName> {
        let name = StageName::new(reference);
        (self.local_stages.contains(&name) && !self.aliases.contains(&name) && &name != self.stage)
            .then_some(name)
    }
}

/// Scans `recipe` for stage references, argument declarations and secrets.
///
/// A reference only becomes a dependency if `local_stages` contains it and
/// it is neither `stage` itself nor an `AS` alias declared earlier in the
/// recipe; any other name is an external image or a local alias. Arguments are collected after the
/// first `FROM` instruction. A recipe without any `FROM` collects arguments
/// from its first line.
#[must_use]
pub fn extract_dependencies(
    recipe: &str,
    stage: &StageName,
    local_stages: &HashSet<StageName>,
) -> RecipeDependencies {
    let lines = logical_lines(recipe);
    let mut references = References {
        stage,
        local_stages,
        aliases: HashSet::new(),
    };
    let mut started = !lines.iter().any(|l| instruction(&l.text) == "FROM");
    let mut result = RecipeDependencies::default();

    for line in &lines {
        match instruction(&line.text).as_str() {
            "FROM" => {
                started = true;
                if let Some(caps) = FROM_PATTERN.captures(&line.text) {
                    if let Some(name) = references.local(&caps[1]) {
                        result.add_dependency(name);
                    }
                    if let Some(alias) = caps.get(2) {
                        references.aliases.insert(StageName::new(alias.as_str()));
                    }
                }
            }
            "COPY" => {
                if let Some(caps) = COPY_FROM_PATTERN.captures(&line.text) {
                    if let Some(name) = references.local(&caps[1]) {
                        result.add_dependency(name);
                    }
                }
            }
            "ARG" if started => {
                let rest = line.text[3..].trim_start();
                for caps in ARG_TOKEN_PATTERN.captures_iter(rest) {
                    let default = caps.get(2).map(|m| unquote(m.as_str()).to_string());
                    result.add_arg(&caps[1], default);
                }
            }
            "RUN" => {
                for caps in MOUNT_PATTERN.captures_iter(&line.text) {
                    if let Some(id) = secret_id(&caps[1]) {
                        result.add_secret(id);
                    }
                }
            }
            _ => {}
        }
    }

    result
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Returns the id of a `type=secret` mount spec.
fn secret_id(spec: &str) -> Option<&str> {
    let mut is_secret = false;
    let mut id = None;
    for option in spec.split(',') {
        match option.split_once('=') {
            Some(("type", "secret")) => is_secret = true,
            Some(("id", value)) => id = Some(value),
            _ => {}
        }
    }
    id.filter(|_| is_secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn app() -> StageName {
        StageName::new("app")
    }

    fn local(names: &[&str]) -> HashSet<StageName> {
        names.iter().map(|n| StageName::new(*n)).collect()
    }

    #[test]
    fn test_from_and_copy_references() {
        let recipe = r#"
FROM base
COPY --from=Tools /usr/bin/tool /usr/bin/tool
COPY --chown=1000 --from=assets /dist /srv
COPY --from=alpine:3.19 /etc/os-release /tmp/
RUN make
"#;
        let deps = extract_dependencies(recipe, &app(), &local(&["base", "tools", "assets"]));

        assert_eq!(
            deps.dependencies,
            vec![StageName::new("base"), StageName::new("tools"), StageName::new("assets")]
        );
    }

    #[test]
    fn test_external_images_excluded() {
        let recipe = "FROM --platform=linux/amd64 ubuntu:22.04 AS build\nFROM build\n";
        let deps = extract_dependencies(recipe, &app(), &local(&["base"]));

        assert!(deps.dependencies.is_empty());
    }

    #[test]
    fn test_platform_flag_on_local_stage() {
        let recipe = "FROM --platform=$BUILDPLATFORM base AS build\n";
        let deps = extract_dependencies(recipe, &app(), &local(&["base"]));

        assert_eq!(deps.dependencies, vec![StageName::new("base")]);
    }

    #[test]
    fn test_duplicate_references_preserve_first_order() {
        let recipe = "FROM b\nCOPY --from=a /x /x\nCOPY --from=b /y /y\nCOPY --from=a /z /z\n";
        let deps = extract_dependencies(recipe, &app(), &local(&["a", "b"]));

        assert_eq!(deps.dependencies, vec![StageName::new("b"), StageName::new("a")]);
    }

    #[test]
    fn test_args_before_first_from_are_ignored() {
        let recipe = r#"
ARG BASE_VERSION=3.19
FROM alpine:${BASE_VERSION}
ARG FOO=bar
ARG QUOTED="hello world" PLAIN
ARG FOO=other
"#;
        let deps = extract_dependencies(recipe, &app(), &local(&[]));

        assert_eq!(
            deps.declared_args,
            vec![
                ("FOO".to_string(), Some("bar".to_string())),
                ("QUOTED".to_string(), Some("hello world".to_string())),
                ("PLAIN".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_recipe_without_from_collects_from_start() {
        let recipe = "ARG VERSION\nRUN echo $VERSION\n";
        let deps = extract_dependencies(recipe, &app(), &local(&[]));

        assert_eq!(deps.declared_args, vec![("VERSION".to_string(), None)]);
    }

    #[test]
    fn test_secret_mounts() {
        let recipe = r#"
FROM alpine
RUN --mount=type=secret,id=npm_token \
    --mount=type=cache,target=/root/.cache \
    --mount=id=pip_conf,type=secret,target=/etc/pip.conf \
    install.sh
RUN --mount=type=secret,id=npm_token other.sh
"#;
        let deps = extract_dependencies(recipe, &app(), &local(&[]));

        assert_eq!(deps.secrets, vec!["npm_token".to_string(), "pip_conf".to_string()]);
    }

    #[test]
    fn test_lowercase_instructions() {
        let recipe = "from base\narg TARGET=release\ncopy --from=tools /a /b\n";
        let deps = extract_dependencies(recipe, &app(), &local(&["BASE", "Tools"]));

        assert_eq!(deps.dependencies.len(), 2);
        assert_eq!(deps.declared_args, vec![("TARGET".to_string(), Some("release".to_string()))]);
    }

    #[test]
    fn test_empty_default_is_kept_as_empty() {
        let deps = extract_dependencies("ARG EMPTY=\n", &app(), &local(&[]));
        assert_eq!(deps.declared_args, vec![("EMPTY".to_string(), Some(String::new()))]);
    }

    #[test]
    fn test_own_name_is_upstream_image() {
        let recipe = "FROM nginx:1.25\nFROM nginx\nCOPY --from=nginx /etc/nginx /etc/nginx\n";
        let deps = extract_dependencies(recipe, &StageName::new("Nginx"), &local(&["nginx", "site"]));

        assert!(deps.dependencies.is_empty());
    }

    #[test]
    fn test_recipe_alias_shadows_local_stage() {
        let recipe = r#"
FROM golang:1.22 AS build
RUN go build -o /out/app
FROM base
COPY --from=build /out/app /app
COPY --from=Build /out/app /app2
"#;
        let deps = extract_dependencies(recipe, &app(), &local(&["build", "base"]));

        assert_eq!(deps.dependencies, vec![StageName::new("base")]);
    }

    #[test]
    fn test_alias_only_shadows_later_references() {
        let recipe = "FROM tools AS tools\nCOPY --from=tools /bin/t /t\n";
        let deps = extract_dependencies(recipe, &app(), &local(&["tools"]));

        assert_eq!(deps.dependencies, vec![StageName::new("tools")]);
    }
}
