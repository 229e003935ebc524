//! Per-node build state and the shared board that records it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{trace, warn};

use crate::package::PackageId;

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum NodeState {
  Pending,
  Fetching,
  Configuring,
  Building,
  Packaging,
  Published,
  Failed(String),
  /// Never started because the named requirement failed.
  Skipped(PackageId),
}

impl NodeState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Published | Self::Failed(_) | Self::Skipped(_))
  }

  /// Whether moving from `self` to `next` is a legal transition.
  ///
  /// The lifecycle runs strictly forward; any non-terminal state may fail; a
  /// pending node may be published straight from the cache or skipped.
  pub fn can_advance_to(&self, next: &NodeState) -> bool {
    use NodeState::*;
    match (self, next) {
      (Pending, Fetching) | (Pending, Published) | (Pending, Skipped(_)) => true,
      (Fetching, Configuring) | (Configuring, Building) | (Building, Packaging) | (Packaging, Published) => true,
      (current, Failed(_)) => !current.is_terminal(),
      _ => false,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Fetching => "fetching",
      Self::Configuring => "configuring",
      Self::Building => "building",
      Self::Packaging => "packaging",
      Self::Published => "published",
      Self::Failed(_) => "failed",
      Self::Skipped(_) => "skipped",
    }
  }
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Failed(reason) => write!(f, "failed ({reason})"),
      Self::Skipped(cause) => write!(f, "skipped (requires failed {cause})"),
      other => f.write_str(other.label()),
    }
  }
}

#[derive(Debug, Default)]
struct BoardInner {
  states: BTreeMap<PackageId, NodeState>,
  history: Vec<(PackageId, NodeState)>,
}

/// Shared, thread-safe record of every node's state plus the order in which
/// transitions happened.
#[derive(Debug, Default)]
pub struct StateBoard {
  inner: Mutex<BoardInner>,
}

impl StateBoard {
  pub fn new<I: IntoIterator<Item = PackageId>>(ids: I) -> Self {
    let states = ids.into_iter().map(|id| (id, NodeState::Pending)).collect();
    Self {
      inner: Mutex::new(BoardInner {
        states,
        history: Vec::new(),
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, BoardInner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Current state; unknown nodes read as `Pending`.
  pub fn get(&self, id: &PackageId) -> NodeState {
    self.lock().states.get(id).cloned().unwrap_or(NodeState::Pending)
  }

  /// Apply a transition. Illegal transitions are logged and ignored.
  pub fn advance(&self, id: &PackageId, next: NodeState) -> bool {
    let mut inner = self.lock();
    let current = inner.states.get(id).cloned().unwrap_or(NodeState::Pending);
    if !current.can_advance_to(&next) {
      warn!(package = %id, from = %current, to = %next, "ignoring illegal state transition");
      return false;
    }
    trace!(package = %id, from = %current, to = %next, "state transition");
    inner.states.insert(id.clone(), next.clone());
    inner.history.push((id.clone(), next));
    true
  }

  pub fn snapshot(&self) -> BTreeMap<PackageId, NodeState> {
    self.lock().states.clone()
  }

  /// Every state `id` has passed through after `Pending`, in order.
  pub fn history_of(&self, id: &PackageId) -> Vec<NodeState> {
    self
      .lock()
      .history
      .iter()
      .filter(|(node, _)| node == id)
      .map(|(_, state)| state.clone())
      .collect()
  }

  /// Full transition log across all nodes.
  pub fn history(&self) -> Vec<(PackageId, NodeState)> {
    self.lock().history.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tracing_test::traced_test;

  fn id(name: &str) -> PackageId {
    PackageId::new(name, "1.0")
  }

  #[test]
  fn forward_path_is_legal() {
    let board = StateBoard::new([id("glfw")]);
    for state in [
      NodeState::Fetching,
      NodeState::Configuring,
      NodeState::Building,
      NodeState::Packaging,
      NodeState::Published,
    ] {
      assert!(board.advance(&id("glfw"), state));
    }
    assert_eq!(board.get(&id("glfw")), NodeState::Published);
    assert_eq!(board.history_of(&id("glfw")).len(), 5);
  }

  #[test]
  fn cache_short_circuit_and_skip() {
    let board = StateBoard::new([id("glm"), id("app")]);
    assert!(board.advance(&id("glm"), NodeState::Published));
    assert!(board.advance(&id("app"), NodeState::Skipped(id("glm"))));
    assert_eq!(board.history_of(&id("glm")), vec![NodeState::Published]);
  }

  #[test]
  #[traced_test]
  fn illegal_transitions_are_ignored() {
    let board = StateBoard::new([id("spdlog")]);
    assert!(!board.advance(&id("spdlog"), NodeState::Building));
    assert!(board.advance(&id("spdlog"), NodeState::Fetching));
    assert!(board.advance(&id("spdlog"), NodeState::Failed("boom".into())));
    assert!(!board.advance(&id("spdlog"), NodeState::Fetching));
    assert!(!board.advance(&id("spdlog"), NodeState::Failed("again".into())));
    assert_eq!(board.get(&id("spdlog")), NodeState::Failed("boom".into()));
    assert!(logs_contain("ignoring illegal state transition"));
  }

  #[test]
  fn display_includes_detail() {
    assert_eq!(NodeState::Skipped(id("glm")).to_string(), "skipped (requires failed glm/1.0)");
    assert_eq!(NodeState::Building.to_string(), "building");
  }
}
