//! On-disk layout of the artifact root and package completion markers.
//!
//! ```text
//! <root>/
//!   .lock
//!   index.json
//!   downloads/                     cached source archives
//!   work/<name>-<version>-<fp>/    scratch space for one lifecycle run
//!   packages/<name>/<version>/<fp>/
//!     include/ lib/ ...
//!     .nativeforge-complete
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::artifact::ArtifactKey;
use crate::consts::PACKAGE_COMPLETE_MARKER;
use crate::util::hash::{DirHashError, hash_directory};

/// Entries excluded when hashing a package directory.
const PACKAGE_HASH_EXCLUSIONS: &[&str] = &[PACKAGE_COMPLETE_MARKER];

#[derive(Debug, Clone)]
pub struct StoreLayout {
  root: PathBuf,
}

impl StoreLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn packages_dir(&self) -> PathBuf {
    self.root.join("packages")
  }

  pub fn package_dir(&self, key: &ArtifactKey) -> PathBuf {
    self
      .packages_dir()
      .join(&key.name)
      .join(&key.version)
      .join(&key.fingerprint)
  }

  pub fn work_dir(&self, key: &ArtifactKey) -> PathBuf {
    self
      .root
      .join("work")
      .join(format!("{}-{}-{}", key.name, key.version, key.fingerprint))
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.root.join("downloads")
  }

  pub fn index_path(&self) -> PathBuf {
    self.root.join(crate::consts::INDEX_FILENAME)
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageMarker {
  pub version: u32,
  pub package: String,
  /// SHA-256 over the package tree (marker excluded).
  pub content_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
  #[error("failed to hash package: {0}")]
  Hash(#[from] DirHashError),

  #[error("failed to write marker: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to encode marker: {0}")]
  Encode(#[from] serde_json::Error),
}

/// Hash the finished package and write its completion marker.
pub fn write_marker(package_dir: &Path, key: &ArtifactKey) -> Result<(), MarkerError> {
  let content_hash = hash_directory(package_dir, PACKAGE_HASH_EXCLUSIONS)?;
  let marker = PackageMarker {
    version: 1,
    package: key.to_string(),
    content_hash: content_hash.0,
  };
  let content = serde_json::to_string(&marker)?;
  std::fs::write(package_dir.join(PACKAGE_COMPLETE_MARKER), format!("{content}\n"))?;
  Ok(())
}

pub fn read_marker(package_dir: &Path) -> Option<PackageMarker> {
  let content = std::fs::read_to_string(package_dir.join(PACKAGE_COMPLETE_MARKER)).ok()?;
  match serde_json::from_str(&content) {
    Ok(marker) => Some(marker),
    Err(e) => {
      debug!(path = ?package_dir, error = %e, "unreadable package marker");
      None
    }
  }
}

/// Cheap check: a marker exists and parses.
pub fn is_complete(package_dir: &Path) -> bool {
  read_marker(package_dir).is_some()
}

/// Full check: the marker's content hash matches the tree on disk.
pub fn verify_package(package_dir: &Path) -> bool {
  let Some(marker) = read_marker(package_dir) else {
    return false;
  };

  match hash_directory(package_dir, PACKAGE_HASH_EXCLUSIONS) {
    Ok(current) if current.0 == marker.content_hash => true,
    Ok(current) => {
      warn!(
        path = ?package_dir,
        expected = %marker.content_hash,
        actual = %current.0,
        "package contents changed since publication, will rebuild"
      );
      false
    }
    Err(e) => {
      warn!(path = ?package_dir, error = %e, "failed to hash package, will rebuild");
      false
    }
  }
}
