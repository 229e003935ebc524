use serde::Serialize;

use crate::artifact::{ArtifactIndex, ArtifactKey};
use crate::graph::DependencyGraph;
use crate::lifecycle::NodeRole;
use crate::package::{BuildVariant, PackageId, option_fingerprint};
use crate::platform::Platform;
use crate::util::hash::HashError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedNode {
  pub id: PackageId,
  pub key: ArtifactKey,
  pub role: NodeRole,
  /// An entry for `key` was in the index when the plan was made.
  pub cached: bool,
}

/// Every node of a graph in build order, with its artifact key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
  pub nodes: Vec<PlannedNode>,
}

impl BuildPlan {
  /// Plan `graph` for one platform and variant. The graph root gets the
  /// project role; everything else is a dependency.
  pub fn compute(
    graph: &DependencyGraph,
    platform: Platform,
    variant: BuildVariant,
    index: &ArtifactIndex,
  ) -> Result<Self, HashError> {
    let root = graph.root().id();
    let mut nodes = Vec::with_capacity(graph.len());

    for id in graph.topological_order() {
      let Some(descriptor) = graph.descriptor(&id) else {
        continue;
      };
      let fingerprint = option_fingerprint(descriptor, platform, variant)?;
      let key = ArtifactKey::new(&id, fingerprint.0);
      let role = if id == root {
        NodeRole::Project
      } else {
        NodeRole::Dependency
      };
      let cached = role == NodeRole::Dependency && index.lookup(&key).is_ok();
      nodes.push(PlannedNode { id, key, role, cached });
    }

    Ok(Self { nodes })
  }

  pub fn get(&self, id: &PackageId) -> Option<&PlannedNode> {
    self.nodes.iter().find(|node| &node.id == id)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
