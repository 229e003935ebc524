//! Descriptor sources.
//!
//! The graph builder asks a [`DescriptorSource`] for each `(name, version)` it
//! encounters. Recipes on disk are TOML files with the same schema as the
//! `[project]` table of `forge.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::graph::GraphError;
use crate::package::types::PackageDescriptor;

/// Resolves a package name and exact version to its descriptor.
///
/// Implementations may return a descriptor whose declared version differs from
/// the requested one; the graph builder rejects that as a version mismatch.
pub trait DescriptorSource {
  fn resolve(&self, name: &str, version: &str) -> Result<PackageDescriptor, GraphError>;
}

/// Recipes stored as TOML files below a directory.
///
/// For `glfw/3.3.4` the candidates are tried in order:
/// - `<dir>/glfw/3.3.4.toml`
/// - `<dir>/glfw/recipe.toml`
/// - `<dir>/glfw.toml`
#[derive(Debug, Clone)]
pub struct RecipeRepository {
  root: PathBuf,
}

impl RecipeRepository {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn candidates(&self, name: &str, version: &str) -> [PathBuf; 3] {
    [
      self.root.join(name).join(format!("{version}.toml")),
      self.root.join(name).join("recipe.toml"),
      self.root.join(format!("{name}.toml")),
    ]
  }

  /// Parse a recipe file.
  pub fn load_file(path: &Path) -> Result<PackageDescriptor, GraphError> {
    let invalid = |message: String| GraphError::InvalidRecipe {
      path: path.to_path_buf(),
      message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    toml::from_str(&content).map_err(|e| invalid(e.to_string()))
  }
}

impl DescriptorSource for RecipeRepository {
  fn resolve(&self, name: &str, version: &str) -> Result<PackageDescriptor, GraphError> {
    for candidate in self.candidates(name, version) {
      if candidate.is_file() {
        debug!(package = %name, version = %version, path = ?candidate, "loading recipe");
        let descriptor = Self::load_file(&candidate)?;
        if descriptor.name != name {
          return Err(GraphError::InvalidRecipe {
            path: candidate,
            message: format!("recipe declares package '{}' but was found for '{}'", descriptor.name, name),
          });
        }
        return Ok(descriptor);
      }
    }

    Err(GraphError::UnknownPackage {
      name: name.to_string(),
      version: version.to_string(),
    })
  }
}

/// Descriptors held in memory, keyed by name then version.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
  descriptors: BTreeMap<String, BTreeMap<String, PackageDescriptor>>,
}

impl MemorySource {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, descriptor: PackageDescriptor) {
    self
      .descriptors
      .entry(descriptor.name.clone())
      .or_default()
      .insert(descriptor.version.clone(), descriptor);
  }

  pub fn with(mut self, descriptor: PackageDescriptor) -> Self {
    self.insert(descriptor);
    self
  }
}

impl DescriptorSource for MemorySource {
  /// An exact version wins; otherwise any known version of the name is returned
  /// so the caller can report what was found instead of the request.
  fn resolve(&self, name: &str, version: &str) -> Result<PackageDescriptor, GraphError> {
    let versions = self.descriptors.get(name).ok_or_else(|| GraphError::UnknownPackage {
      name: name.to_string(),
      version: version.to_string(),
    })?;

    versions
      .get(version)
      .or_else(|| versions.values().next())
      .cloned()
      .ok_or_else(|| GraphError::UnknownPackage {
        name: name.to_string(),
        version: version.to_string(),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
  }

  #[test]
  fn repository_prefers_versioned_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "glfw/3.3.4.toml", "name = \"glfw\"\nversion = \"3.3.4\"\n");
    write(temp.path(), "glfw/recipe.toml", "name = \"glfw\"\nversion = \"3.3.0\"\n");

    let repo = RecipeRepository::new(temp.path());
    assert_eq!(repo.resolve("glfw", "3.3.4").unwrap().version, "3.3.4");
    // Unversioned fallback may declare a different version; the graph decides.
    assert_eq!(repo.resolve("glfw", "3.3.8").unwrap().version, "3.3.0");
  }

  #[test]
  fn repository_flat_file_and_unknown() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "glm.toml", "name = \"glm\"\nversion = \"0.9.9.8\"\n");

    let repo = RecipeRepository::new(temp.path());
    assert_eq!(repo.resolve("glm", "0.9.9.8").unwrap().name, "glm");
    assert!(matches!(
      repo.resolve("spdlog", "1.10.0"),
      Err(GraphError::UnknownPackage { name, .. }) if name == "spdlog"
    ));
  }

  #[test]
  fn repository_reports_invalid_recipe() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "stb.toml", "name = \"stb\"\nversion = 3\n");
    write(temp.path(), "other.toml", "name = \"glm\"\nversion = \"1\"\n");

    let repo = RecipeRepository::new(temp.path());
    assert!(matches!(repo.resolve("stb", "master"), Err(GraphError::InvalidRecipe { .. })));
    assert!(matches!(repo.resolve("other", "1"), Err(GraphError::InvalidRecipe { .. })));
  }

  #[test]
  fn memory_source_falls_back_to_known_version() {
    let source = MemorySource::new().with(PackageDescriptor::new("glfw", "3.3.4"));
    assert_eq!(source.resolve("glfw", "3.3.4").unwrap().version, "3.3.4");
    assert_eq!(source.resolve("glfw", "3.3.8").unwrap().version, "3.3.4");
    assert!(source.resolve("glm", "1").is_err());
  }
}
