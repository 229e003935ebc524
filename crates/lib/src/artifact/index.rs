//! The artifact index: publication and lookup of built packages.
//!
//! Entries are immutable once published. The map sits behind an `RwLock`
//! so a publication is visible to every reader as soon as `publish` returns,
//! and every publication is persisted before the write lock is released.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifact::store::{StoreLayout, is_complete};
use crate::artifact::{Artifact, ArtifactKey};
use crate::consts::INDEX_VERSION;
use crate::util::fs::write_atomic;

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("artifact {key} is already published with different contents")]
  DuplicateArtifact { key: ArtifactKey },

  #[error("artifact {key} not found")]
  NotFound { key: ArtifactKey },

  #[error("failed to read artifact index {path}: {message}")]
  Load { path: PathBuf, message: String },

  #[error("failed to persist artifact index: {0}")]
  Persist(#[source] std::io::Error),

  #[error("artifact index lock poisoned")]
  Poisoned,
}

impl<T> From<PoisonError<T>> for PublishError {
  fn from(_: PoisonError<T>) -> Self {
    PublishError::Poisoned
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
  Inserted,
  /// An identical artifact was already present.
  Unchanged,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
  key: ArtifactKey,
  artifact: Artifact,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
  version: u32,
  entries: Vec<IndexEntry>,
}

#[derive(Debug)]
pub struct ArtifactIndex {
  path: Option<PathBuf>,
  entries: RwLock<BTreeMap<ArtifactKey, Artifact>>,
}

impl ArtifactIndex {
  /// An index that is never written to disk.
  pub fn in_memory() -> Self {
    Self {
      path: None,
      entries: RwLock::new(BTreeMap::new()),
    }
  }

  /// Load the index stored in an artifact root.
  ///
  /// A missing file yields an empty index. Entries whose package directory is
  /// gone or was never completed are dropped.
  pub fn open(layout: &StoreLayout) -> Result<Self, PublishError> {
    let path = layout.index_path();
    let mut entries = BTreeMap::new();

    match std::fs::read_to_string(&path) {
      Ok(content) => {
        let file: IndexFile = serde_json::from_str(&content).map_err(|e| PublishError::Load {
          path: path.clone(),
          message: e.to_string(),
        })?;
        if file.version != INDEX_VERSION {
          return Err(PublishError::Load {
            path,
            message: format!("unsupported index version {}", file.version),
          });
        }
        for entry in file.entries {
          if is_complete(&entry.artifact.package_dir) {
            entries.insert(entry.key, entry.artifact);
          } else {
            warn!(artifact = %entry.key, "dropping index entry without a complete package");
          }
        }
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = ?path, "no artifact index yet");
      }
      Err(e) => {
        return Err(PublishError::Load {
          path,
          message: e.to_string(),
        });
      }
    }

    Ok(Self {
      path: Some(path),
      entries: RwLock::new(entries),
    })
  }

  /// Register a built artifact.
  ///
  /// Re-publishing an identical artifact is a no-op; a different artifact
  /// under an existing key is rejected.
  pub fn publish(&self, key: ArtifactKey, artifact: Artifact) -> Result<PublishOutcome, PublishError> {
    let mut entries = self.entries.write()?;

    if let Some(existing) = entries.get(&key) {
      if *existing == artifact {
        debug!(artifact = %key, "artifact already published");
        return Ok(PublishOutcome::Unchanged);
      }
      return Err(PublishError::DuplicateArtifact { key });
    }

    entries.insert(key.clone(), artifact);
    if let Err(e) = self.persist(&entries) {
      entries.remove(&key);
      return Err(e);
    }

    info!(artifact = %key, "artifact published");
    Ok(PublishOutcome::Inserted)
  }

  pub fn lookup(&self, key: &ArtifactKey) -> Result<Artifact, PublishError> {
    self
      .entries
      .read()?
      .get(key)
      .cloned()
      .ok_or_else(|| PublishError::NotFound { key: key.clone() })
  }

  /// Drop an entry whose package turned out to be unusable.
  pub fn invalidate(&self, key: &ArtifactKey) -> Result<bool, PublishError> {
    let mut entries = self.entries.write()?;
    let Some(removed) = entries.remove(key) else {
      return Ok(false);
    };
    if let Err(e) = self.persist(&entries) {
      entries.insert(key.clone(), removed);
      return Err(e);
    }
    warn!(artifact = %key, "artifact invalidated");
    Ok(true)
  }

  /// Every indexed artifact, ordered by key.
  pub fn entries(&self) -> Result<Vec<(ArtifactKey, Artifact)>, PublishError> {
    Ok(
      self
        .entries
        .read()?
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }

  pub fn len(&self) -> usize {
    self.entries.read().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn persist(&self, entries: &BTreeMap<ArtifactKey, Artifact>) -> Result<(), PublishError> {
    let Some(path) = &self.path else {
      return Ok(());
    };

    let file = IndexFile {
      version: INDEX_VERSION,
      entries: entries
        .iter()
        .map(|(key, artifact)| IndexEntry {
          key: key.clone(),
          artifact: artifact.clone(),
        })
        .collect(),
    };
    let content = serde_json::to_vec_pretty(&file).map_err(|e| PublishError::Persist(std::io::Error::other(e)))?;
    write_atomic(path, &content).map_err(PublishError::Persist)
  }
}
