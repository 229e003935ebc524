//! Fake collaborators for tests.
//!
//! Each fake records its calls and can be told to fail for one package (or
//! one source file) so executor, scheduler and orchestrator tests can drive
//! every failure path without cmake, glslc or the network.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::artifact::StoreLayout;
use crate::lifecycle::{
  BuildTool, ConfigureRequest, LifecycleSettings, RemoteSource, SourceFetcher, Step, ToolError, ToolOutput,
};
use crate::package::BuildVariant;
use crate::platform::Platform;
use crate::platform::arch::Arch;
use crate::platform::os::Os;
use crate::shader::{CompileError, ShaderCompiler};

fn fake_failure(program: &str, what: &str) -> ToolError {
  ToolError::CommandFailed {
    program: program.to_string(),
    code: Some(1),
    stderr: format!("fake failure in {what}"),
  }
}

/// Settings rooted in a scratch directory, for a fixed linux platform.
pub fn test_settings(root: &Path) -> LifecycleSettings {
  LifecycleSettings {
    layout: StoreLayout::new(root.join("artifacts")),
    platform: Platform::new(Arch::X86_64, Os::Linux),
    variant: BuildVariant::Release,
    build_jobs: 2,
    project_dir: root.join("project"),
    sdks: Default::default(),
  }
}

/// Writes a minimal source tree instead of downloading one.
#[derive(Debug, Default)]
pub struct FakeFetcher {
  calls: Mutex<Vec<String>>,
  fail_on: Option<String>,
}

impl FakeFetcher {
  /// Fail any fetch whose URL contains `needle`.
  pub fn failing_on(needle: &str) -> Self {
    Self {
      fail_on: Some(needle.to_string()),
      ..Default::default()
    }
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

impl SourceFetcher for FakeFetcher {
  async fn fetch(&self, source: &RemoteSource, dest: &Path) -> Result<(), ToolError> {
    self.calls.lock().unwrap().push(source.url().to_string());
    if let Some(needle) = &self.fail_on
      && source.url().contains(needle.as_str())
    {
      return Err(ToolError::Download {
        url: source.url().to_string(),
        message: "fake network failure".to_string(),
      });
    }
    std::fs::create_dir_all(dest.join("include"))?;
    std::fs::write(dest.join("CMakeLists.txt"), "project(fake)\n")?;
    std::fs::write(dest.join("include").join("fake.h"), "#pragma once\n")?;
    Ok(())
  }
}

/// A build tool whose install step lays out `include/` and `lib/` in the prefix.
///
/// Failures are matched by a substring of the build (or source) directory,
/// which contains the package name for every dependency work dir.
#[derive(Debug, Default)]
pub struct FakeBuildTool {
  calls: Mutex<Vec<(Step, PathBuf)>>,
  configure_args: Mutex<Vec<Vec<String>>>,
  fail_on: Option<(String, Step)>,
  delay: Duration,
  slow_on: Option<String>,
  running: AtomicUsize,
  peak: AtomicUsize,
}

impl FakeBuildTool {
  pub fn failing_on(needle: &str, step: Step) -> Self {
    Self {
      fail_on: Some((needle.to_string(), step)),
      ..Default::default()
    }
  }

  /// Make every build step take `delay`, so overlapping builds can be observed.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Restrict the build delay to build dirs containing `needle`.
  pub fn slow_on(mut self, needle: &str) -> Self {
    self.slow_on = Some(needle.to_string());
    self
  }

  pub fn calls(&self) -> Vec<(Step, PathBuf)> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_for(&self, step: Step) -> usize {
    self.calls().iter().filter(|(s, _)| *s == step).count()
  }

  pub fn configure_args(&self) -> Vec<Vec<String>> {
    self.configure_args.lock().unwrap().clone()
  }

  /// Highest number of builds observed running at once.
  pub fn peak_concurrency(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }

  fn record(&self, step: Step, dir: &Path) -> Result<(), ToolError> {
    self.calls.lock().unwrap().push((step, dir.to_path_buf()));
    if let Some((needle, fail_step)) = &self.fail_on
      && *fail_step == step
      && dir.to_string_lossy().contains(needle.as_str())
    {
      return Err(fake_failure("cmake", &format!("{step} of {}", dir.display())));
    }
    Ok(())
  }
}

impl BuildTool for FakeBuildTool {
  async fn configure(&self, request: &ConfigureRequest) -> Result<ToolOutput, ToolError> {
    self.configure_args.lock().unwrap().push(request.args.clone());
    self.record(Step::Configure, &request.build_dir)?;
    std::fs::create_dir_all(&request.build_dir)?;
    Ok(ToolOutput::default())
  }

  async fn build(&self, build_dir: &Path, _variant: BuildVariant, _jobs: usize) -> Result<ToolOutput, ToolError> {
    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    let slow = self
      .slow_on
      .as_ref()
      .is_none_or(|needle| build_dir.to_string_lossy().contains(needle.as_str()));
    if slow && !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.running.fetch_sub(1, Ordering::SeqCst);
    self.record(Step::Build, build_dir)?;
    Ok(ToolOutput::default())
  }

  async fn install(&self, build_dir: &Path, prefix: &Path, _variant: BuildVariant) -> Result<ToolOutput, ToolError> {
    self.record(Step::Package, build_dir)?;
    std::fs::create_dir_all(prefix.join("include"))?;
    std::fs::create_dir_all(prefix.join("lib"))?;
    std::fs::write(prefix.join("include").join("fake.h"), "#pragma once\n")?;
    std::fs::write(prefix.join("lib").join("libfake.a"), "!<arch>\n")?;
    Ok(ToolOutput::default())
  }
}

/// Writes a placeholder `.spv` for each source unless the source path
/// contains the failure needle.
#[derive(Debug, Default)]
pub struct FakeShaderCompiler {
  calls: Mutex<Vec<PathBuf>>,
  fail_on: Option<String>,
}

impl FakeShaderCompiler {
  pub fn failing_on(needle: &str) -> Self {
    Self {
      fail_on: Some(needle.to_string()),
      ..Default::default()
    }
  }

  pub fn calls(&self) -> Vec<PathBuf> {
    let mut calls = self.calls.lock().unwrap().clone();
    calls.sort();
    calls
  }
}

impl ShaderCompiler for FakeShaderCompiler {
  async fn compile(&self, source: &Path, output: &Path) -> Result<(), CompileError> {
    self.calls.lock().unwrap().push(source.to_path_buf());
    if let Some(needle) = &self.fail_on
      && source.to_string_lossy().contains(needle.as_str())
    {
      return Err(fake_failure("glslc", &source.display().to_string()).into());
    }
    std::fs::write(output, b"\x03\x02\x23\x07")?;
    Ok(())
  }
}
