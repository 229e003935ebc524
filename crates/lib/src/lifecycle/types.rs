use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::artifact::PublishError;

/// The four steps a node goes through before it is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
  Fetch,
  Configure,
  Build,
  Package,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Step::Fetch => "fetch",
      Step::Configure => "configure",
      Step::Build => "build",
      Step::Package => "package",
    })
  }
}

/// Failure reported by a collaborator (fetcher, build tool) or by packaging.
#[derive(Debug, Error)]
pub enum ToolError {
  #[error("{program} exited with code {code:?}{}", stderr_suffix(.stderr))]
  CommandFailed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("download of {url} failed: {message}")]
  Download { url: String, message: String },

  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error("git fetch of {url} failed: {message}")]
  Git { url: String, message: String },

  #[error("cannot unpack {path}: {message}")]
  Archive { path: PathBuf, message: String },

  #[error("sdk '{name}' is not configured")]
  SdkNotConfigured { name: String },

  #[error("sdk '{name}' at {path} is version {found}, recipe expects {expected}")]
  SdkVersionMismatch {
    name: String,
    path: PathBuf,
    expected: String,
    found: String,
  },

  #[error("invalid copy pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  #[error("source directory {0} does not exist")]
  MissingSource(PathBuf),

  #[error("package {0} declares no source")]
  NoSource(String),

  #[error("failed to write package marker: {0}")]
  Marker(String),

  #[error(transparent)]
  Publish(#[from] PublishError),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
  let trimmed = stderr.trim();
  if trimmed.is_empty() {
    String::new()
  } else {
    let last = trimmed.lines().last().unwrap_or(trimmed);
    format!(": {last}")
  }
}

/// A node's lifecycle failed; the variant names the step.
#[derive(Debug, Error)]
pub enum LifecycleError {
  #[error("fetch failed: {0}")]
  Fetch(#[source] ToolError),

  #[error("configure failed: {0}")]
  Configure(#[source] ToolError),

  #[error("build failed: {0}")]
  Build(#[source] ToolError),

  #[error("package failed: {0}")]
  Package(#[source] ToolError),
}

impl LifecycleError {
  pub fn step(&self) -> Step {
    match self {
      Self::Fetch(_) => Step::Fetch,
      Self::Configure(_) => Step::Configure,
      Self::Build(_) => Step::Build,
      Self::Package(_) => Step::Package,
    }
  }

  pub fn cause(&self) -> &ToolError {
    match self {
      Self::Fetch(e) | Self::Configure(e) | Self::Build(e) | Self::Package(e) => e,
    }
  }
}

/// Captured output of an external tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
}
