//! Implementation of the `nforge graph` command.

use std::path::Path;

use anyhow::Result;

use nativeforge_lib::config::ConfigOverrides;
use nativeforge_lib::orchestrate::Orchestrator;

use crate::cmd::load_config;
use crate::output::{self, print_json, print_stat, print_success};

/// Resolve the dependency graph and print it in build order, grouped into
/// waves of packages that could build at the same time.
pub fn cmd_graph(config_path: &Path, json: bool) -> Result<()> {
  let config = load_config(config_path, ConfigOverrides::default())?;
  let orchestrator = Orchestrator::from_config(config);
  let graph = orchestrator.resolve_graph()?;
  let waves = graph.waves();

  if json {
    let nodes: Vec<_> = graph
      .topological_order()
      .into_iter()
      .map(|id| {
        let requires: Vec<String> = graph.dependencies(&id).iter().map(ToString::to_string).collect();
        serde_json::json!({ "id": id.to_string(), "requires": requires })
      })
      .collect();
    let waves: Vec<Vec<String>> = waves
      .iter()
      .map(|wave| wave.iter().map(ToString::to_string).collect())
      .collect();
    let json_output = serde_json::json!({ "project": graph.root().id().to_string(), "nodes": nodes, "waves": waves });
    print_json(&json_output)?;
    return Ok(());
  }

  print_success(&format!("Resolved {} package(s)", graph.len()));
  print_stat("Project", &graph.root().id().to_string());
  for (number, wave) in waves.iter().enumerate() {
    println!();
    println!("Wave {}:", number + 1);
    for id in wave {
      let requires = graph.dependencies(id);
      if requires.is_empty() {
        println!("  {} {}", output::symbols::INFO, id);
      } else {
        let names: Vec<String> = requires.iter().map(ToString::to_string).collect();
        println!(
          "  {} {} {} {}",
          output::symbols::INFO,
          id,
          output::symbols::ARROW,
          names.join(", ")
        );
      }
    }
  }

  Ok(())
}
