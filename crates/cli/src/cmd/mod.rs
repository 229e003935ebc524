mod build;
mod graph;
mod info;
mod shaders;
mod status;

pub use build::{BuildArgs, cmd_build};
pub use graph::cmd_graph;
pub use info::cmd_info;
pub use shaders::cmd_shaders;
pub use status::cmd_status;

use std::path::Path;

use anyhow::{Context, Result};

use nativeforge_lib::config::{ConfigOverrides, ForgeConfig};

fn load_config(path: &Path, overrides: ConfigOverrides) -> Result<ForgeConfig> {
  let mut config = ForgeConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
  config.apply(overrides)?;
  Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
