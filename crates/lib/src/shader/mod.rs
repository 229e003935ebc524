//! Shader asset stage.
//!
//! Shader sources are discovered by extension under a media directory and each
//! one is handed to an external compiler, producing `<stem><Stage>.spv` in the
//! output directory. The stage is best-effort: every item is attempted and the
//! [`ShaderReport`] records each outcome.

mod compiler;
mod discover;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::lifecycle::ToolError;

pub use compiler::{GlslcCompiler, ShaderCompiler};
pub use discover::discover;

#[derive(Debug, Error)]
pub enum ShaderError {
  #[error("shader media directory {0} does not exist")]
  MissingMediaDir(PathBuf),

  #[error("failed to scan {path}: {message}")]
  Scan { path: PathBuf, message: String },
}

/// Failure of a single shader item.
#[derive(Debug, Error)]
pub enum CompileError {
  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("output {output} is already produced by {claimed_by}")]
  OutputClaimed { output: PathBuf, claimed_by: PathBuf },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("compile task aborted: {0}")]
  Aborted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
  Vertex,
  Fragment,
  Compute,
  Geometry,
  TessControl,
  TessEval,
}

impl ShaderStage {
  pub const ALL: [ShaderStage; 6] = [
    Self::Vertex,
    Self::Fragment,
    Self::Compute,
    Self::Geometry,
    Self::TessControl,
    Self::TessEval,
  ];

  pub fn from_extension(ext: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|stage| stage.extension() == ext)
  }

  pub fn extension(&self) -> &'static str {
    match self {
      Self::Vertex => "vert",
      Self::Fragment => "frag",
      Self::Compute => "comp",
      Self::Geometry => "geom",
      Self::TessControl => "tesc",
      Self::TessEval => "tese",
    }
  }

  /// Suffix appended to the source stem in the output name.
  pub fn tag(&self) -> &'static str {
    match self {
      Self::Vertex => "Vert",
      Self::Fragment => "Frag",
      Self::Compute => "Comp",
      Self::Geometry => "Geom",
      Self::TessControl => "Tesc",
      Self::TessEval => "Tese",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum CompileStatus {
  Pending,
  Succeeded,
  Failed(String),
}

impl fmt::Display for CompileStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Pending => f.write_str("pending"),
      Self::Succeeded => f.write_str("succeeded"),
      Self::Failed(message) => write!(f, "failed: {message}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderWorkItem {
  pub source: PathBuf,
  pub output: PathBuf,
  pub stage: ShaderStage,
  pub status: CompileStatus,
}

/// Outcome of a shader stage, one entry per discovered item sorted by source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShaderReport {
  pub items: Vec<ShaderWorkItem>,
}

impl ShaderReport {
  pub fn is_success(&self) -> bool {
    self.items.iter().all(|item| item.status == CompileStatus::Succeeded)
  }

  pub fn succeeded(&self) -> impl Iterator<Item = &ShaderWorkItem> {
    self.items.iter().filter(|item| item.status == CompileStatus::Succeeded)
  }

  pub fn failed(&self) -> impl Iterator<Item = &ShaderWorkItem> {
    self
      .items
      .iter()
      .filter(|item| matches!(item.status, CompileStatus::Failed(_)))
  }
}

/// Compile every pending item, at most `jobs` at a time.
///
/// A failing item never stops the others. Items that arrive already failed
/// (output collisions found during discovery) are reported unchanged.
pub async fn compile_all<C: ShaderCompiler>(compiler: Arc<C>, items: Vec<ShaderWorkItem>, jobs: usize) -> ShaderReport {
  let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
  let mut tasks = JoinSet::new();
  let mut task_items = HashMap::new();
  let mut done = Vec::with_capacity(items.len());

  for item in items {
    if item.status != CompileStatus::Pending {
      done.push(item);
      continue;
    }

    let compiler = Arc::clone(&compiler);
    let semaphore = Arc::clone(&semaphore);
    let (source, output) = (item.source.clone(), item.output.clone());
    let handle = tasks.spawn(async move {
      let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| CompileError::Aborted(e.to_string()))?;
      if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
      }
      debug!(source = ?source, output = ?output, "compiling shader");
      compiler.compile(&source, &output).await
    });
    task_items.insert(handle.id(), item);
  }

  while let Some(joined) = tasks.join_next_with_id().await {
    let (task_id, result) = match joined {
      Ok((id, result)) => (id, result),
      Err(e) => (e.id(), Err(CompileError::Aborted(e.to_string()))),
    };
    let Some(mut item) = task_items.remove(&task_id) else {
      continue;
    };

    item.status = match result {
      Ok(()) => {
        info!(source = ?item.source, output = ?item.output, "shader compiled");
        CompileStatus::Succeeded
      }
      Err(e) => {
        warn!(source = ?item.source, error = %e, "shader failed to compile");
        CompileStatus::Failed(e.to_string())
      }
    };
    done.push(item);
  }

  done.sort_by(|a, b| a.source.cmp(&b.source));
  ShaderReport { items: done }
}
