//! Docker-compatible command-line runtime.

use super::{BuildInvocation, ContainerRuntime, ImageEntry};
use crate::errors::RuntimeError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Drives `docker` (or a compatible binary such as `podman`) as a subprocess.
///
/// Builds inherit stdout/stderr so the build tool's own progress output
/// reaches the user; queries capture their output.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    /// Creates a runtime that invokes `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The binary being invoked.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    async fn capture(&self, args: Vec<String>) -> Result<Output, RuntimeError> {
        debug!(command = %self.command_line(&args), "Running runtime query");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RuntimeError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(RuntimeError::NonZeroExit {
                command: self.command_line(&args),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build(&self, invocation: &BuildInvocation) -> Result<(), RuntimeError> {
        let args = invocation.to_args();
        debug!(command = %self.command_line(&args), "Running build");

        let status = Command::new(&self.program)
            .args(&args)
            .env("DOCKER_BUILDKIT", "1")
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| RuntimeError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::NonZeroExit {
                command: self.command_line(&args),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }

    async fn image_id(&self, tag: &str) -> Result<String, RuntimeError> {
        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{.Id}}".to_string(),
            tag.to_string(),
        ];
        let command = self.command_line(&args);
        let output = self.capture(args).await?;
        parse_image_id(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| RuntimeError::Output {
            command,
            reason: "no image id in output".to_string(),
        })
    }

    async fn list_images(&self, filters: &[String]) -> Result<Vec<ImageEntry>, RuntimeError> {
        let mut args = vec![
            "images".to_string(),
            "--no-trunc".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        for filter in filters {
            args.push("--filter".to_string());
            args.push(filter.clone());
        }
        let command = self.command_line(&args);
        let output = self.capture(args).await?;
        parse_image_lines(&String::from_utf8_lossy(&output.stdout)).map_err(|reason| {
            RuntimeError::Output { command, reason }
        })
    }

    async fn prune(&self, filters: &[String]) -> Result<(), RuntimeError> {
        let mut args = vec!["image".to_string(), "prune".to_string(), "--force".to_string()];
        for filter in filters {
            args.push("--filter".to_string());
            args.push(filter.clone());
        }
        self.capture(args).await.map(|_| ())
    }
}

/// First non-empty line of `image inspect` output.
fn parse_image_id(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}

/// One line of `docker images --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct ImageLine {
    #[serde(rename = "CreatedAt", default)]
    created_at: String,
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Repository")]
    repository: String,
    #[serde(rename = "Tag")]
    tag: String,
}

fn parse_image_lines(stdout: &str) -> Result<Vec<ImageEntry>, String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parsed: ImageLine = serde_json::from_str(line).map_err(|e| e.to_string())?;
            Ok(ImageEntry {
                created_at: parse_created_at(&parsed.created_at),
                image_id: parsed.id,
                repository: parsed.repository,
                tag: parsed.tag,
            })
        })
        .collect()
}

/// Parses docker's `2024-01-15 10:20:30 +0000 UTC` timestamps.
fn parse_created_at(value: &str) -> Option<DateTime<FixedOffset>> {
    let prefix: Vec<&str> = value.split_whitespace().take(3).collect();
    if prefix.len() < 3 {
        return None;
    }
    DateTime::parse_from_str(&prefix.join(" "), "%Y-%m-%d %H:%M:%S %z").ok()
}
