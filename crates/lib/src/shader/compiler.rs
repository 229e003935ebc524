use std::future::Future;
use std::path::{Path, PathBuf};

use crate::lifecycle::cmake::run_tool;
use crate::shader::CompileError;

/// Compiles one shader source into one binary output.
pub trait ShaderCompiler: Send + Sync + 'static {
  fn compile(&self, source: &Path, output: &Path) -> impl Future<Output = Result<(), CompileError>> + Send;
}

/// Runs `<program> [args] <source> -o <output>`; `glslc` by default.
#[derive(Debug, Clone)]
pub struct GlslcCompiler {
  program: PathBuf,
  args: Vec<String>,
}

impl Default for GlslcCompiler {
  fn default() -> Self {
    Self::new("glslc", Vec::new())
  }
}

impl GlslcCompiler {
  pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }

  pub fn command_args(&self, source: &Path, output: &Path) -> Vec<String> {
    let mut args = self.args.clone();
    args.push(source.to_string_lossy().into_owned());
    args.push("-o".to_string());
    args.push(output.to_string_lossy().into_owned());
    args
  }
}

impl ShaderCompiler for GlslcCompiler {
  async fn compile(&self, source: &Path, output: &Path) -> Result<(), CompileError> {
    let cwd = source.parent().unwrap_or(Path::new("."));
    run_tool(&self.program, &self.command_args(source, output), cwd).await?;
    Ok(())
  }
}
