use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::package::PackageId;

/// Identity of a published artifact: package plus configuration fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
  pub name: String,
  pub version: String,
  pub fingerprint: String,
}

impl ArtifactKey {
  pub fn new(id: &PackageId, fingerprint: impl Into<String>) -> Self {
    Self {
      name: id.name.clone(),
      version: id.version.clone(),
      fingerprint: fingerprint.into(),
    }
  }
}

impl fmt::Display for ArtifactKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}#{}", self.name, self.version, self.fingerprint)
  }
}

/// What a consumer needs to compile and link against a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  /// Root of the packaged tree; also the prefix handed to dependents.
  pub package_dir: PathBuf,
  pub include_dirs: BTreeSet<PathBuf>,
  pub lib_dirs: BTreeSet<PathBuf>,
  pub libs: Vec<String>,
}

impl Artifact {
  pub fn new(package_dir: impl Into<PathBuf>) -> Self {
    Self {
      package_dir: package_dir.into(),
      include_dirs: BTreeSet::new(),
      lib_dirs: BTreeSet::new(),
      libs: Vec::new(),
    }
  }
}
