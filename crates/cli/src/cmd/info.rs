use std::path::Path;

use anyhow::Result;

use nativeforge_lib::config::ForgeConfig;
use nativeforge_lib::platform::Platform;
use nativeforge_lib::platform::paths::default_artifact_root;

use crate::output::{print_stat, print_warning};

/// Print host information, and the resolved settings when a configuration
/// file is present.
pub fn cmd_info(config_path: &Path) -> Result<()> {
  println!("System:");
  match Platform::current() {
    Some(platform) => print_stat("Platform", &platform.to_string()),
    None => print_stat("Platform", "unsupported"),
  }
  print_stat("Default artifact root", &default_artifact_root().display().to_string());

  if !config_path.exists() {
    return Ok(());
  }

  let config = match ForgeConfig::load(config_path) {
    Ok(config) => config,
    Err(e) => {
      print_warning(&format!("Could not load {}: {}", config_path.display(), e));
      return Ok(());
    }
  };

  println!();
  println!("Project:");
  print_stat("Package", &config.project.id().to_string());
  print_stat("Target platform", &config.build.platform.to_string());
  print_stat("Variant", &config.build.variant.to_string());
  print_stat("Jobs", &config.build.jobs.to_string());
  print_stat("Artifact root", &config.build.artifact_root.display().to_string());
  print_stat("Recipes", &config.build.recipes.display().to_string());
  print_stat("CMake", &config.tools.cmake.display().to_string());
  print_stat("Shader compiler", &config.shaders.compiler.display().to_string());
  print_stat("Shader sources", &config.shaders.media_dir.display().to_string());
  for (name, dir) in &config.sdks {
    print_stat(&format!("SDK {name}"), &dir.display().to_string());
  }

  Ok(())
}
