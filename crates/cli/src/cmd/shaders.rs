//! Implementation of the `nforge shaders` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use nativeforge_lib::config::ConfigOverrides;
use nativeforge_lib::orchestrate::Orchestrator;

use crate::cmd::{load_config, runtime};
use crate::output::{self, print_error, print_info, print_json, print_stat, print_success};

/// Compile every shader under the media directory without building anything
/// else. Failing shaders do not stop the others.
pub fn cmd_shaders(config_path: &Path, jobs: Option<usize>, json: bool) -> Result<()> {
  let config = load_config(
    config_path,
    ConfigOverrides {
      jobs,
      ..Default::default()
    },
  )?;
  let output_dir = config.shader_output_dir();
  let orchestrator = Orchestrator::from_config(config);

  let rt = runtime()?;
  let report = rt
    .block_on(orchestrator.compile_shaders())
    .context("Shader compilation failed")?;

  if json {
    print_json(&report)?;
  } else if report.items.is_empty() {
    print_info("No shaders found");
  } else {
    for item in report.succeeded() {
      print_success(&format!(
        "{} {} {}",
        item.source.display(),
        output::symbols::ARROW,
        item.output.display()
      ));
    }
    for item in report.failed() {
      print_error(&format!("{}: {}", item.source.display(), item.status));
    }
    println!();
    print_stat("Output", &output_dir.display().to_string());
    print_stat("Compiled", &report.succeeded().count().to_string());
    print_stat("Failed", &report.failed().count().to_string());
  }

  if !report.is_success() {
    bail!("{} shader(s) failed to compile", report.failed().count());
  }
  Ok(())
}
