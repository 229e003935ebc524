//! Dependency graph of package descriptors.
//!
//! Nodes are unique `(name, version)` pairs; an edge points from a requirement
//! to the package that requires it. The graph is built by a recursive walk
//! from the root descriptor (see [`builder`]) and is acyclic by construction.
//!
//! All queries are deterministic: ties are broken by the order in which nodes
//! were first encountered during the walk.

mod builder;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::package::{PackageDescriptor, PackageId};

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("cyclic dependency: {}", format_chain(.chain))]
  CyclicDependency { chain: Vec<PackageId> },

  #[error("unknown package {name}/{version}")]
  UnknownPackage { name: String, version: String },

  #[error("version mismatch for {name}: requested {requested}, found {found}")]
  VersionMismatch {
    name: String,
    requested: String,
    found: String,
  },

  #[error("invalid recipe {path}: {message}")]
  InvalidRecipe { path: PathBuf, message: String },
}

fn format_chain(chain: &[PackageId]) -> String {
  chain.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

/// A resolved, acyclic dependency graph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  graph: DiGraph<PackageDescriptor, ()>,
  nodes: HashMap<PackageId, NodeIndex>,
  root: NodeIndex,
}

impl DependencyGraph {
  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  pub fn root(&self) -> &PackageDescriptor {
    &self.graph[self.root]
  }

  pub fn contains(&self, id: &PackageId) -> bool {
    self.nodes.contains_key(id)
  }

  pub fn descriptor(&self, id: &PackageId) -> Option<&PackageDescriptor> {
    self.nodes.get(id).map(|&idx| &self.graph[idx])
  }

  /// Nodes in the order they were first encountered (root first).
  pub fn nodes(&self) -> impl Iterator<Item = &PackageDescriptor> {
    self.graph.node_indices().map(|idx| &self.graph[idx])
  }

  /// Direct requirements of `id`, in discovery order.
  pub fn dependencies(&self, id: &PackageId) -> Vec<PackageId> {
    self.neighbors(id, Direction::Incoming)
  }

  /// Packages that directly require `id`, in discovery order.
  pub fn dependents(&self, id: &PackageId) -> Vec<PackageId> {
    self.neighbors(id, Direction::Outgoing)
  }

  /// Everything that (directly or indirectly) requires `id`.
  pub fn transitive_dependents(&self, id: &PackageId) -> BTreeSet<PackageId> {
    let mut seen = BTreeSet::new();
    let mut stack = self.dependents(id);
    while let Some(next) = stack.pop() {
      if seen.insert(next.clone()) {
        stack.extend(self.dependents(&next));
      }
    }
    seen
  }

  /// Everything `id` requires, directly or indirectly.
  pub fn transitive_dependencies(&self, id: &PackageId) -> BTreeSet<PackageId> {
    let mut seen = BTreeSet::new();
    let mut stack = self.dependencies(id);
    while let Some(next) = stack.pop() {
      if seen.insert(next.clone()) {
        stack.extend(self.dependencies(&next));
      }
    }
    seen
  }

  fn neighbors(&self, id: &PackageId, direction: Direction) -> Vec<PackageId> {
    let Some(&idx) = self.nodes.get(id) else {
      return Vec::new();
    };
    let mut indices: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
    indices.sort();
    indices.dedup();
    indices.into_iter().map(|i| self.graph[i].id()).collect()
  }

  /// Requirements first, root last. Among nodes whose requirements are all
  /// placed, the earliest-discovered goes first.
  pub fn topological_order(&self) -> Vec<PackageId> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();
    let mut ready: BTreeSet<NodeIndex> = self
      .graph
      .node_indices()
      .filter(|idx| in_degree[idx.index()] == 0)
      .collect();
    let mut order = Vec::with_capacity(self.graph.node_count());

    while let Some(idx) = ready.pop_first() {
      order.push(self.graph[idx].id());
      for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        let degree = &mut in_degree[dependent.index()];
        *degree -= 1;
        if *degree == 0 {
          ready.insert(dependent);
        }
      }
    }

    order
  }

  /// Group nodes into waves; every node's requirements lie in earlier waves.
  pub fn waves(&self) -> Vec<Vec<PackageId>> {
    let mut level: HashMap<NodeIndex, usize> = HashMap::new();
    let mut waves: Vec<Vec<PackageId>> = Vec::new();

    for id in self.topological_order() {
      let idx = self.nodes[&id];
      let wave = self
        .graph
        .neighbors_directed(idx, Direction::Incoming)
        .map(|dep| level[&dep] + 1)
        .max()
        .unwrap_or(0);
      level.insert(idx, wave);
      if waves.len() <= wave {
        waves.resize_with(wave + 1, Vec::new);
      }
      waves[wave].push(id);
    }

    waves
  }

  fn verify_acyclic(&self) -> Result<(), GraphError> {
    toposort(&self.graph, None).map_err(|cycle| GraphError::CyclicDependency {
      chain: vec![self.graph[cycle.node_id()].id()],
    })?;
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::package::{MemorySource, PackageRef};

  pub(crate) fn pkg(name: &str, version: &str, requires: &[&str]) -> PackageDescriptor {
    let mut descriptor = PackageDescriptor::new(name, version);
    descriptor.requires = requires.iter().map(|r| r.parse::<PackageRef>().unwrap()).collect();
    descriptor
  }

  fn id(name: &str, version: &str) -> PackageId {
    PackageId::new(name, version)
  }

  /// renderer -> glfw, glm, spdlog; spdlog -> fmt; glfw -> glm
  fn renderer_graph() -> DependencyGraph {
    let root = pkg("renderer", "0.1.0", &["glfw/3.3.4", "glm/0.9.9.8", "spdlog/1.10.0"]);
    let source = MemorySource::new()
      .with(pkg("glfw", "3.3.4", &["glm/0.9.9.8"]))
      .with(pkg("glm", "0.9.9.8", &[]))
      .with(pkg("spdlog", "1.10.0", &["fmt/8.1.1"]))
      .with(pkg("fmt", "8.1.1", &[]));
    DependencyGraph::build(root, &source).unwrap()
  }

  #[test]
  fn topological_order_places_requirements_first() {
    let graph = renderer_graph();
    let order = graph.topological_order();

    assert_eq!(
      order,
      vec![
        id("glm", "0.9.9.8"),
        id("glfw", "3.3.4"),
        id("fmt", "8.1.1"),
        id("spdlog", "1.10.0"),
        id("renderer", "0.1.0"),
      ]
    );
  }

  #[test]
  fn waves_group_independent_nodes() {
    let graph = renderer_graph();
    let waves = graph.waves();

    assert_eq!(waves.len(), 3);
    assert_eq!(waves[0], vec![id("glm", "0.9.9.8"), id("fmt", "8.1.1")]);
    assert_eq!(waves[1], vec![id("glfw", "3.3.4"), id("spdlog", "1.10.0")]);
    assert_eq!(waves[2], vec![id("renderer", "0.1.0")]);
  }

  #[test]
  fn neighbor_queries() {
    let graph = renderer_graph();
    let glm = id("glm", "0.9.9.8");

    assert_eq!(graph.len(), 5);
    assert_eq!(graph.root().name, "renderer");
    assert_eq!(graph.dependents(&glm), vec![id("renderer", "0.1.0"), id("glfw", "3.3.4")]);
    assert_eq!(graph.dependencies(&id("glfw", "3.3.4")), vec![glm.clone()]);
    assert_eq!(
      graph.transitive_dependents(&id("fmt", "8.1.1")),
      BTreeSet::from([id("spdlog", "1.10.0"), id("renderer", "0.1.0")])
    );
    assert_eq!(
      graph.transitive_dependencies(&id("spdlog", "1.10.0")),
      BTreeSet::from([id("fmt", "8.1.1")])
    );
    assert_eq!(graph.transitive_dependencies(&id("renderer", "0.1.0")).len(), 4);
    assert!(graph.dependencies(&id("missing", "1")).is_empty());
  }

  #[test]
  fn shared_requirement_is_interned_once() {
    let graph = renderer_graph();
    let glm_count = graph.nodes().filter(|d| d.name == "glm").count();
    assert_eq!(glm_count, 1);
    assert!(graph.verify_acyclic().is_ok());
  }
}
