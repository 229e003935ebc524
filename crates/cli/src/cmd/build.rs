//! Implementation of the `nforge build` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use nativeforge_lib::config::ConfigOverrides;
use nativeforge_lib::orchestrate::{Orchestrator, RunOptions, RunReport};
use nativeforge_lib::package::BuildVariant;

use crate::cmd::{load_config, runtime};
use crate::output::{self, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning};

pub struct BuildArgs {
  pub jobs: Option<usize>,
  pub variant: Option<BuildVariant>,
  pub artifact_root: Option<PathBuf>,
  pub skip_shaders: bool,
}

/// Run the full build: dependencies, the project, then shaders.
///
/// Exits with an error when any node or shader failed; everything that did
/// succeed stays published.
pub fn cmd_build(config_path: &Path, args: BuildArgs, verbose: bool, json: bool) -> Result<()> {
  let config = load_config(
    config_path,
    ConfigOverrides {
      jobs: args.jobs,
      variant: args.variant,
      artifact_root: args.artifact_root,
    },
  )?;
  let orchestrator = Orchestrator::from_config(config);

  let rt = runtime()?;
  let report = rt
    .block_on(orchestrator.run(RunOptions {
      skip_shaders: args.skip_shaders,
    }))
    .context("Build failed")?;

  if json {
    print_json(&report)?;
  } else {
    print_report(&report, verbose);
  }

  if !report.is_success() {
    bail!("build finished with failures");
  }
  Ok(())
}

fn print_report(report: &RunReport, verbose: bool) {
  let schedule = &report.schedule;

  for node in &schedule.published {
    let how = if node.reused { "reused" } else { "built" };
    print_success(&format!("{} ({})", node.id, how));
    if verbose {
      print_stat("Fingerprint", output::truncate_hash(&node.key.fingerprint));
      print_stat("Location", &node.artifact.package_dir.display().to_string());
    }
  }

  for failure in &schedule.failures {
    match failure.step {
      Some(step) => print_error(&format!("{} failed during {}: {}", failure.id, step, failure.message)),
      None => print_error(&format!("{} failed: {}", failure.id, failure.message)),
    }
  }
  for skipped in &schedule.skipped {
    print_warning(&format!("{} skipped: requirement {} failed", skipped.id, skipped.cause));
  }
  for id in &schedule.not_started {
    print_warning(&format!("{} not started", id));
  }

  if let Some(shaders) = &report.shaders {
    println!();
    let total = shaders.items.len();
    let failed: Vec<_> = shaders.failed().collect();
    if failed.is_empty() {
      print_success(&format!("Compiled {} shader(s)", total));
    } else {
      print_warning(&format!("{} of {} shader(s) failed", failed.len(), total));
      for item in failed {
        print_error(&format!("{} {} {}", item.source.display(), output::symbols::ARROW, item.status));
      }
    }
  } else if schedule.is_success() {
    print_info("Shader stage skipped");
  }

  println!();
  if report.is_success() {
    print_success(&format!("Build complete in {}", format_duration(report.elapsed)));
  } else {
    print_error(&format!("Build failed after {}", format_duration(report.elapsed)));
  }
  print_stat("Packages", &report.plan.len().to_string());
  print_stat(
    "Reused",
    &schedule.published.iter().filter(|n| n.reused).count().to_string(),
  );
}
