//! Build scheduling over the dependency graph.
//!
//! A node is released once every requirement is published. Released nodes
//! launch in topological position order, at most `max_workers` at a time.
//! The first failure halts new launches; in-flight nodes are allowed to
//! finish, every transitive dependent of a failed node is marked skipped and
//! unrelated nodes that never launched are reported as not started.

mod plan;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::artifact::{Artifact, ArtifactKey};
use crate::graph::DependencyGraph;
use crate::lifecycle::{
  BuildTool, LifecycleError, LifecycleExecutor, NodeJob, NodeRole, NodeState, SourceFetcher, Step,
};
use crate::package::PackageId;

pub use plan::{BuildPlan, PlannedNode};

#[derive(Debug, Clone, Serialize)]
pub struct PublishedNode {
  pub id: PackageId,
  pub key: ArtifactKey,
  pub artifact: Artifact,
  /// Taken from the artifact index without running the lifecycle.
  pub reused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeFailure {
  pub id: PackageId,
  /// `None` when the task itself died rather than a step failing.
  pub step: Option<Step>,
  pub message: String,
}

impl NodeFailure {
  fn from_lifecycle(id: PackageId, error: &LifecycleError) -> Self {
    Self {
      id,
      step: Some(error.step()),
      message: error.to_string(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedNode {
  pub id: PackageId,
  /// The failed requirement that caused the skip.
  pub cause: PackageId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleReport {
  /// Published nodes in completion order.
  pub published: Vec<PublishedNode>,
  /// Failures in the order they were observed; the first is the root cause.
  pub failures: Vec<NodeFailure>,
  pub skipped: Vec<SkippedNode>,
  pub not_started: Vec<PackageId>,
  /// Nodes whose lifecycle was started, in launch order.
  pub launch_order: Vec<PackageId>,
}

impl ScheduleReport {
  pub fn is_success(&self) -> bool {
    self.failures.is_empty() && self.skipped.is_empty() && self.not_started.is_empty()
  }

  /// The first failure observed.
  pub fn failure(&self) -> Option<&NodeFailure> {
    self.failures.first()
  }

  pub fn published(&self, id: &PackageId) -> Option<&PublishedNode> {
    self.published.iter().find(|node| &node.id == id)
  }
}

pub struct Scheduler<F, B> {
  executor: Arc<LifecycleExecutor<F, B>>,
  max_workers: usize,
}

impl<F: SourceFetcher, B: BuildTool> Scheduler<F, B> {
  pub fn new(executor: Arc<LifecycleExecutor<F, B>>, max_workers: usize) -> Self {
    Self {
      executor,
      max_workers: max_workers.max(1),
    }
  }

  pub fn executor(&self) -> &Arc<LifecycleExecutor<F, B>> {
    &self.executor
  }

  /// Drive every node of `graph` to a terminal state.
  pub async fn run(&self, graph: &DependencyGraph, plan: &BuildPlan) -> ScheduleReport {
    let order = graph.topological_order();
    let position: HashMap<PackageId, usize> = order.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
    let mut waiting: HashMap<PackageId, usize> =
      order.iter().map(|id| (id.clone(), graph.dependencies(id).len())).collect();
    let mut ready: BTreeMap<usize, PackageId> = order
      .iter()
      .enumerate()
      .filter(|(_, id)| waiting.get(*id) == Some(&0))
      .map(|(i, id)| (i, id.clone()))
      .collect();

    let mut report = ScheduleReport::default();
    let mut artifacts: HashMap<PackageId, Artifact> = HashMap::new();
    let mut tasks: JoinSet<Result<Artifact, LifecycleError>> = JoinSet::new();
    let mut running: HashMap<tokio::task::Id, (PackageId, ArtifactKey)> = HashMap::new();

    info!(nodes = order.len(), workers = self.max_workers, "scheduling build");

    loop {
      while report.failures.is_empty()
        && tasks.len() < self.max_workers
        && let Some((_, id)) = ready.pop_first()
      {
        let Some(node) = plan.get(&id) else {
          warn!(package = %id, "node missing from build plan");
          report
            .failures
            .push(missing_node(id, "node missing from build plan".to_string()));
          break;
        };

        if node.role == NodeRole::Dependency
          && let Some(artifact) = self.executor.try_reuse(&id, &node.key).await
        {
          release(graph, &id, &position, &mut waiting, &mut ready);
          artifacts.insert(id.clone(), artifact.clone());
          report.published.push(PublishedNode {
            id,
            key: node.key.clone(),
            artifact,
            reused: true,
          });
          continue;
        }

        let Some(descriptor) = graph.descriptor(&id).cloned() else {
          report
            .failures
            .push(missing_node(id, "node missing from graph".to_string()));
          break;
        };
        let mut requirements: Vec<PackageId> = graph.transitive_dependencies(&id).into_iter().collect();
        requirements.sort_by_key(|dep| position.get(dep).copied().unwrap_or(usize::MAX));
        let dependencies = requirements
          .iter()
          .filter_map(|dep| artifacts.get(dep).cloned())
          .collect();
        let job = NodeJob {
          descriptor,
          key: node.key.clone(),
          role: node.role,
          dependencies,
        };

        debug!(package = %id, "launching node");
        let executor = Arc::clone(&self.executor);
        let handle = tasks.spawn(async move { executor.run(job).await });
        running.insert(handle.id(), (id.clone(), node.key.clone()));
        report.launch_order.push(id);
      }

      let Some(joined) = tasks.join_next_with_id().await else {
        break;
      };

      match joined {
        Ok((task_id, result)) => {
          let Some((id, key)) = running.remove(&task_id) else {
            continue;
          };
          match result {
            Ok(artifact) => {
              release(graph, &id, &position, &mut waiting, &mut ready);
              artifacts.insert(id.clone(), artifact.clone());
              report.published.push(PublishedNode {
                id,
                key,
                artifact,
                reused: false,
              });
            }
            Err(e) => report.failures.push(NodeFailure::from_lifecycle(id, &e)),
          }
        }
        Err(join_error) => {
          let Some((id, _)) = running.remove(&join_error.id()) else {
            continue;
          };
          error!(package = %id, error = %join_error, "build task aborted");
          self
            .executor
            .board()
            .advance(&id, NodeState::Failed(join_error.to_string()));
          report.failures.push(missing_node(id, join_error.to_string()));
        }
      }
    }

    self.settle(graph, &order, &mut report);
    report
  }

  /// Classify every node that did not reach a terminal state.
  fn settle(&self, graph: &DependencyGraph, order: &[PackageId], report: &mut ScheduleReport) {
    let done: BTreeSet<PackageId> = report
      .published
      .iter()
      .map(|n| n.id.clone())
      .chain(report.failures.iter().map(|f| f.id.clone()))
      .collect();
    let mut skipped: BTreeMap<PackageId, PackageId> = BTreeMap::new();

    for failure in &report.failures {
      for dependent in graph.transitive_dependents(&failure.id) {
        if done.contains(&dependent) || skipped.contains_key(&dependent) {
          continue;
        }
        self
          .executor
          .board()
          .advance(&dependent, NodeState::Skipped(failure.id.clone()));
        warn!(package = %dependent, cause = %failure.id, "skipping node, requirement failed");
        skipped.insert(dependent, failure.id.clone());
      }
    }

    for id in order {
      if let Some(cause) = skipped.get(id) {
        report.skipped.push(SkippedNode {
          id: id.clone(),
          cause: cause.clone(),
        });
      } else if !done.contains(id) {
        report.not_started.push(id.clone());
      }
    }

    if let Some(first) = report.failure() {
      error!(
        package = %first.id,
        skipped = report.skipped.len(),
        not_started = report.not_started.len(),
        "build failed"
      );
    } else {
      info!(published = report.published.len(), "all nodes published");
    }
  }
}

fn missing_node(id: PackageId, message: String) -> NodeFailure {
  NodeFailure {
    id,
    step: None,
    message,
  }
}

/// Mark `id` published for its dependents, queueing those with nothing left to wait on.
fn release(
  graph: &DependencyGraph,
  id: &PackageId,
  position: &HashMap<PackageId, usize>,
  waiting: &mut HashMap<PackageId, usize>,
  ready: &mut BTreeMap<usize, PackageId>,
) {
  for dependent in graph.dependents(id) {
    let Some(count) = waiting.get_mut(&dependent) else {
      continue;
    };
    *count = count.saturating_sub(1);
    if *count == 0
      && let Some(&pos) = position.get(&dependent)
    {
      ready.insert(pos, dependent);
    }
  }
}
