//! Status command implementation.
//!
//! Plans the build against the current artifact index and shows which
//! dependencies are already published and which would be rebuilt. With
//! `--verbose` it also lists everything in the artifact index.

use std::path::Path;

use anyhow::Result;

use nativeforge_lib::config::ConfigOverrides;
use nativeforge_lib::lifecycle::NodeRole;
use nativeforge_lib::orchestrate::Orchestrator;
use nativeforge_lib::util::fs::dir_size;

use crate::cmd::load_config;
use crate::output::{self, format_bytes, print_info, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_status(config_path: &Path, verbose: bool, json: bool) -> Result<()> {
  let config = load_config(config_path, ConfigOverrides::default())?;
  let orchestrator = Orchestrator::from_config(config);
  let graph = orchestrator.resolve_graph()?;
  let index = orchestrator.open_index()?;
  let plan = orchestrator.plan(&graph, &index)?;
  let layout = orchestrator.layout();
  let usage = dir_size(&layout.packages_dir());
  let entries = index.entries()?;

  let dependencies: Vec<_> = plan.nodes.iter().filter(|n| n.role == NodeRole::Dependency).collect();
  let cached = dependencies.iter().filter(|n| n.cached).count();

  if json {
    let json_output = serde_json::json!({
      "artifact_root": layout.root(),
      "indexed": entries.len(),
      "artifacts": entries
        .iter()
        .map(|(key, artifact)| serde_json::json!({ "key": key, "package_dir": artifact.package_dir }))
        .collect::<Vec<_>>(),
      "store_usage_bytes": usage,
      "plan": plan,
    });
    print_json(&json_output)?;
    return Ok(());
  }

  let config = orchestrator.config();
  print_success(&graph.root().id().to_string());
  print_stat("Platform", &config.build.platform.to_string());
  print_stat("Variant", &config.build.variant.to_string());
  print_stat("Artifact root", &layout.root().display().to_string());
  print_stat("Indexed artifacts", &entries.len().to_string());
  print_stat("Store usage", &format_bytes(usage));
  print_stat("Dependencies", &format!("{} ({} published)", dependencies.len(), cached));

  if verbose && !entries.is_empty() {
    println!();
    println!("Artifact index:");
    for (key, _) in &entries {
      println!(
        "  {} {}/{}-{}",
        output::symbols::INFO,
        key.name,
        key.version,
        truncate_hash(&key.fingerprint)
      );
    }
  }

  if dependencies.is_empty() {
    return Ok(());
  }
  if cached == dependencies.len() {
    println!();
    print_info("All dependencies are published; only the project will build.");
  }

  if verbose || cached < dependencies.len() {
    println!();
    println!("Dependencies:");
    for node in dependencies {
      let state = if node.cached { "published" } else { "needs build" };
      println!(
        "  {} {}-{} {}",
        output::symbols::INFO,
        node.id,
        truncate_hash(&node.key.fingerprint),
        state
      );
    }
  }

  Ok(())
}
