//! Recursive construction of the dependency graph.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};

use super::{DependencyGraph, GraphError};
use crate::package::{DescriptorSource, PackageDescriptor, PackageId};

struct Builder<'a, S: DescriptorSource + ?Sized> {
  source: &'a S,
  graph: DiGraph<PackageDescriptor, ()>,
  nodes: HashMap<PackageId, NodeIndex>,
  /// First version requested for each package name.
  requested: HashMap<String, String>,
  /// Packages on the current recursion path, outermost first.
  stack: Vec<PackageId>,
}

impl DependencyGraph {
  /// Resolve `root` and everything it transitively requires.
  ///
  /// Fails before any build work on:
  /// - a requirement that names a package on the current path (`CyclicDependency`)
  /// - two requests for one package with different versions, or a descriptor
  ///   whose declared version differs from the request (`VersionMismatch`)
  /// - a requirement the source cannot resolve (`UnknownPackage`)
  pub fn build<S: DescriptorSource + ?Sized>(root: PackageDescriptor, source: &S) -> Result<Self, GraphError> {
    let mut builder = Builder {
      source,
      graph: DiGraph::new(),
      nodes: HashMap::new(),
      requested: HashMap::new(),
      stack: Vec::new(),
    };

    builder.requested.insert(root.name.clone(), root.version.clone());
    let root_idx = builder.visit(root)?;

    let graph = DependencyGraph {
      graph: builder.graph,
      nodes: builder.nodes,
      root: root_idx,
    };
    graph.verify_acyclic()?;

    debug!(root = %graph.root().id(), nodes = graph.len(), "dependency graph resolved");
    Ok(graph)
  }
}

impl<S: DescriptorSource + ?Sized> Builder<'_, S> {
  fn visit(&mut self, descriptor: PackageDescriptor) -> Result<NodeIndex, GraphError> {
    let id = descriptor.id();
    let requires = descriptor.requires.clone();

    let idx = self.graph.add_node(descriptor);
    self.nodes.insert(id.clone(), idx);
    self.stack.push(id.clone());
    trace!(package = %id, "visiting");

    for requirement in requires {
      let req_id = requirement.id();

      match self.requested.get(&requirement.name) {
        Some(previous) if *previous != requirement.version => {
          return Err(GraphError::VersionMismatch {
            name: requirement.name.clone(),
            requested: requirement.version.clone(),
            found: previous.clone(),
          });
        }
        Some(_) => {}
        None => {
          self.requested.insert(requirement.name.clone(), requirement.version.clone());
        }
      }

      if let Some(pos) = self.stack.iter().position(|p| p.name == requirement.name) {
        let mut chain = self.stack[pos..].to_vec();
        chain.push(req_id);
        return Err(GraphError::CyclicDependency { chain });
      }

      let dep_idx = match self.nodes.get(&req_id) {
        Some(&existing) => existing,
        None => {
          let resolved = self.source.resolve(&requirement.name, &requirement.version)?;
          if resolved.version != requirement.version {
            return Err(GraphError::VersionMismatch {
              name: requirement.name.clone(),
              requested: requirement.version.clone(),
              found: resolved.version,
            });
          }
          self.visit(resolved)?
        }
      };

      self.graph.update_edge(dep_idx, idx, ());
    }

    self.stack.pop();
    Ok(idx)
  }
}
