//! Package descriptor types.
//!
//! A descriptor is the immutable record of one native library: identity,
//! options, requirements, where its sources come from, how it is built and how
//! its installed tree is turned into a consumable artifact. Descriptors are
//! plain data deserialized from recipe files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::package::options::PackageOptions;
use crate::platform::os::Os;

/// Identity of a node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId {
  pub name: String,
  pub version: String,
}

impl PackageId {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
    }
  }
}

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.name, self.version)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package reference '{input}': {reason}")]
pub struct RefParseError {
  pub input: String,
  pub reason: &'static str,
}

/// A requirement as written in a recipe: `name/version[@user/channel]`.
///
/// The namespace after `@` is kept for display only; resolution uses the exact
/// `name` and `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageRef {
  pub name: String,
  pub version: String,
  pub namespace: Option<String>,
}

impl PackageRef {
  pub fn id(&self) -> PackageId {
    PackageId::new(&self.name, &self.version)
  }
}

impl FromStr for PackageRef {
  type Err = RefParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = |reason| RefParseError {
      input: s.to_string(),
      reason,
    };

    let (reference, namespace) = match s.split_once('@') {
      Some((reference, namespace)) if !namespace.is_empty() => (reference, Some(namespace.to_string())),
      Some(_) => return Err(err("empty namespace after '@'")),
      None => (s, None),
    };

    let (name, version) = reference.split_once('/').ok_or_else(|| err("expected 'name/version'"))?;
    if name.is_empty() || version.is_empty() {
      return Err(err("name and version must not be empty"));
    }
    if version.contains('/') {
      return Err(err("version must not contain '/'"));
    }

    Ok(Self {
      name: name.to_string(),
      version: version.to_string(),
      namespace,
    })
  }
}

impl TryFrom<String> for PackageRef {
  type Error = RefParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<PackageRef> for String {
  fn from(value: PackageRef) -> Self {
    value.to_string()
  }
}

impl fmt::Display for PackageRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.name, self.version)?;
    if let Some(namespace) = &self.namespace {
      write!(f, "@{namespace}")?;
    }
    Ok(())
  }
}

/// Where a package's sources come from.
///
/// `{version}` in URLs expands to the descriptor version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceLocator {
  Archive {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
  },
  Git {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
  },
  Path {
    path: PathBuf,
  },
  /// A locally installed SDK, located through the `[sdks]` configuration table.
  Sdk {
    name: String,
  },
}

/// How a package is turned from sources into an installed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildKind {
  /// Configured, built and installed through CMake.
  #[serde(rename = "cmake")]
  CMake {
    /// Fixed `-D` definitions passed on every configure.
    #[serde(default)]
    definitions: BTreeMap<String, String>,
    /// Name of the definition that toggles shared libraries. Defaults to
    /// `BUILD_SHARED_LIBS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shared_flag: Option<String>,
    /// Definition names for extra options, e.g. `wchar_api = "SPDLOG_WCHAR_SUPPORT"`.
    /// Unmapped options are passed upper-cased.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    option_flags: BTreeMap<String, String>,
  },
  /// Headers only: nothing to configure or build, copy rules do the packaging.
  HeaderOnly,
  /// Already-built binaries (e.g. an SDK): packaging through copy rules only.
  Prebuilt,
}

impl Default for BuildKind {
  fn default() -> Self {
    Self::CMake {
      definitions: BTreeMap::new(),
      shared_flag: None,
      option_flags: BTreeMap::new(),
    }
  }
}

/// Copy files from the source tree into the packaged artifact.
///
/// Patterns are glob patterns (`*`, `?`, `[a-z]`, `**`) matched against paths
/// relative to `from`. A `*` also matches across `/`, so `*.h` picks headers
/// at any depth. An empty pattern list copies everything. Directories named
/// in `exclude` are skipped entirely.
/// Matched files keep their relative path below `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
  #[serde(default)]
  pub from: String,
  pub to: String,
  #[serde(default)]
  pub patterns: Vec<String>,
  #[serde(default)]
  pub exclude: Vec<String>,
}

/// Library names a consumer links against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
  #[serde(default)]
  pub libs: Vec<String>,
  /// Per-OS replacement for `libs`, keyed by OS identifier ("windows", ...).
  #[serde(default)]
  pub platform_libs: BTreeMap<String, Vec<String>>,
  /// Collect names from the packaged `lib/` directory instead.
  #[serde(default)]
  pub collect: bool,
}

impl LinkSpec {
  /// Declared library names for `os`, or `None` when they must be collected.
  pub fn declared_for(&self, os: Os) -> Option<&[String]> {
    if self.collect {
      return None;
    }
    let libs = self.platform_libs.get(os.as_str()).unwrap_or(&self.libs);
    if libs.is_empty() { None } else { Some(libs) }
  }
}

/// The full description of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
  pub name: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub homepage: Option<String>,
  #[serde(default)]
  pub options: PackageOptions,
  #[serde(default)]
  pub requires: Vec<PackageRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<SourceLocator>,
  /// Subdirectory of the fetched tree holding the build root.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_subdir: Option<String>,
  #[serde(default)]
  pub build: BuildKind,
  #[serde(default)]
  pub package: Vec<CopyRule>,
  #[serde(default)]
  pub link: LinkSpec,
}

impl PackageDescriptor {
  /// Minimal CMake descriptor with no requirements; handy for building graphs in code.
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
      description: None,
      license: None,
      homepage: None,
      options: PackageOptions::default(),
      requires: Vec::new(),
      source: None,
      source_subdir: None,
      build: BuildKind::default(),
      package: Vec::new(),
      link: LinkSpec::default(),
    }
  }

  pub fn id(&self) -> PackageId {
    PackageId::new(&self.name, &self.version)
  }

  pub fn is_header_only(&self) -> bool {
    matches!(self.build, BuildKind::HeaderOnly)
  }

  /// Expand `{version}` and `{name}` placeholders in recipe strings.
  pub fn expand(&self, template: &str) -> String {
    template.replace("{version}", &self.version).replace("{name}", &self.name)
  }

  pub fn source_subdir(&self) -> Option<String> {
    self.source_subdir.as_deref().map(|subdir| self.expand(subdir))
  }
}
