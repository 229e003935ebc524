//! The external build tool.
//!
//! The executor drives three commands through [`BuildTool`]; only the exit
//! status and captured output matter. [`CMakeTool`] maps them onto
//! `cmake -S/-B`, `cmake --build` and `cmake --install`.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::lifecycle::types::{ToolError, ToolOutput};
use crate::package::BuildVariant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRequest {
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  /// Extra configure arguments, typically `-D` definitions.
  pub args: Vec<String>,
}

pub trait BuildTool: Send + Sync + 'static {
  fn configure(&self, request: &ConfigureRequest) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;

  fn build(
    &self,
    build_dir: &Path,
    variant: BuildVariant,
    jobs: usize,
  ) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;

  fn install(
    &self,
    build_dir: &Path,
    prefix: &Path,
    variant: BuildVariant,
  ) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;
}

#[derive(Debug, Clone)]
pub struct CMakeTool {
  program: PathBuf,
  generator: Option<String>,
}

impl Default for CMakeTool {
  fn default() -> Self {
    Self::new("cmake", None)
  }
}

impl CMakeTool {
  pub fn new(program: impl Into<PathBuf>, generator: Option<String>) -> Self {
    Self {
      program: program.into(),
      generator,
    }
  }

  pub fn configure_args(&self, request: &ConfigureRequest) -> Vec<String> {
    let mut args = vec![
      "-S".to_string(),
      path_arg(&request.source_dir),
      "-B".to_string(),
      path_arg(&request.build_dir),
    ];
    if let Some(generator) = &self.generator {
      args.push("-G".to_string());
      args.push(generator.clone());
    }
    args.extend(request.args.iter().cloned());
    args
  }

  pub fn build_args(build_dir: &Path, variant: BuildVariant, jobs: usize) -> Vec<String> {
    vec![
      "--build".to_string(),
      path_arg(build_dir),
      "--config".to_string(),
      variant.cmake_name().to_string(),
      "--parallel".to_string(),
      jobs.max(1).to_string(),
    ]
  }

  pub fn install_args(build_dir: &Path, prefix: &Path, variant: BuildVariant) -> Vec<String> {
    vec![
      "--install".to_string(),
      path_arg(build_dir),
      "--prefix".to_string(),
      path_arg(prefix),
      "--config".to_string(),
      variant.cmake_name().to_string(),
    ]
  }
}

impl BuildTool for CMakeTool {
  async fn configure(&self, request: &ConfigureRequest) -> Result<ToolOutput, ToolError> {
    tokio::fs::create_dir_all(&request.build_dir).await?;
    run_tool(&self.program, &self.configure_args(request), &request.build_dir).await
  }

  async fn build(&self, build_dir: &Path, variant: BuildVariant, jobs: usize) -> Result<ToolOutput, ToolError> {
    run_tool(&self.program, &Self::build_args(build_dir, variant, jobs), build_dir).await
  }

  async fn install(&self, build_dir: &Path, prefix: &Path, variant: BuildVariant) -> Result<ToolOutput, ToolError> {
    run_tool(&self.program, &Self::install_args(build_dir, prefix, variant), build_dir).await
  }
}

fn path_arg(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

/// Run an external program to completion, capturing its output.
///
/// A non-zero exit is a `CommandFailed` carrying stderr.
pub async fn run_tool(program: &Path, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError> {
  let program_name = program.to_string_lossy().into_owned();
  info!(program = %program_name, args = ?args, "running tool");

  let output = Command::new(program)
    .args(args)
    .current_dir(cwd)
    .output()
    .await
    .map_err(|source| ToolError::Spawn {
      program: program_name.clone(),
      source,
    })?;

  let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

  if !stdout.is_empty() {
    debug!(program = %program_name, stdout = %stdout.trim_end(), "tool stdout");
  }
  if !stderr.is_empty() {
    debug!(program = %program_name, stderr = %stderr.trim_end(), "tool stderr");
  }

  if !output.status.success() {
    return Err(ToolError::CommandFailed {
      program: program_name,
      code: output.status.code(),
      stderr,
    });
  }

  Ok(ToolOutput { stdout, stderr })
}
