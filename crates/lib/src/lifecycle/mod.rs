//! Per-node lifecycle: Fetch, Configure, Build, Package, then publish.
//!
//! A node is all-or-nothing. Work happens in a scratch directory below the
//! artifact root; only a fully packaged tree is moved into its final location,
//! marked complete and published. Any failure removes the scratch directory
//! and leaves the index untouched.
//!
//! The executor is the only component that advances lifecycle states on the
//! [`StateBoard`].

pub mod archive;
pub mod cmake;
pub mod fetch;
pub mod package;
pub mod state;
mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::artifact::store::{verify_package, write_marker};
use crate::artifact::{Artifact, ArtifactIndex, ArtifactKey, StoreLayout};
use crate::package::{BuildKind, BuildVariant, PackageDescriptor, PackageId, SourceLocator, cmake_args};
use crate::platform::Platform;
use crate::util::fs::{move_dir, remove_dir_if_exists};

pub use cmake::{BuildTool, CMakeTool, ConfigureRequest};
pub use fetch::{DefaultFetcher, RemoteSource, SourceFetcher};
pub use state::{NodeState, StateBoard};
pub use types::{LifecycleError, Step, ToolError, ToolOutput};

/// Run-wide inputs shared by every node.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
  pub layout: StoreLayout,
  pub platform: Platform,
  pub variant: BuildVariant,
  /// Parallelism handed to each build tool invocation.
  pub build_jobs: usize,
  /// Directory relative `path` sources resolve against; root of the project.
  pub project_dir: PathBuf,
  pub sdks: BTreeMap<String, PathBuf>,
}

impl LifecycleSettings {
  /// Build directory of the top-level project.
  pub fn project_build_dir(&self) -> PathBuf {
    self.project_dir.join("build").join(self.variant.as_str())
  }

  /// Install prefix of the top-level project.
  pub fn project_install_dir(&self) -> PathBuf {
    self.project_build_dir().join("install")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
  /// A library published into the shared artifact store.
  Dependency,
  /// The top-level project: installed into its own build tree, never indexed.
  Project,
}

/// Everything needed to run one node.
#[derive(Debug, Clone)]
pub struct NodeJob {
  pub descriptor: PackageDescriptor,
  pub key: ArtifactKey,
  pub role: NodeRole,
  /// Published artifacts of every requirement, direct or indirect, in
  /// topological order.
  pub dependencies: Vec<Artifact>,
}

pub struct LifecycleExecutor<F, B> {
  fetcher: Arc<F>,
  tool: Arc<B>,
  index: Arc<ArtifactIndex>,
  board: Arc<StateBoard>,
  settings: Arc<LifecycleSettings>,
}

impl<F: SourceFetcher, B: BuildTool> LifecycleExecutor<F, B> {
  pub fn new(
    fetcher: Arc<F>,
    tool: Arc<B>,
    index: Arc<ArtifactIndex>,
    board: Arc<StateBoard>,
    settings: Arc<LifecycleSettings>,
  ) -> Self {
    Self {
      fetcher,
      tool,
      index,
      board,
      settings,
    }
  }

  pub fn board(&self) -> &Arc<StateBoard> {
    &self.board
  }

  pub fn index(&self) -> &Arc<ArtifactIndex> {
    &self.index
  }

  pub fn settings(&self) -> &LifecycleSettings {
    &self.settings
  }

  /// Publish `id` straight from the index when a verified artifact exists.
  ///
  /// A hit whose package no longer matches its completion marker is dropped
  /// from the index so the node gets rebuilt.
  pub async fn try_reuse(&self, id: &PackageId, key: &ArtifactKey) -> Option<Artifact> {
    let artifact = self.index.lookup(key).ok()?;

    let dir = artifact.package_dir.clone();
    let valid = tokio::task::spawn_blocking(move || verify_package(&dir))
      .await
      .unwrap_or(false);

    if !valid {
      if let Err(e) = self.index.invalidate(key) {
        warn!(artifact = %key, error = %e, "failed to invalidate stale artifact");
      }
      return None;
    }

    info!(package = %id, artifact = %key, "reusing published artifact");
    self.board.advance(id, NodeState::Published);
    Some(artifact)
  }

  /// Run every step for `job`.
  pub async fn run(&self, job: NodeJob) -> Result<Artifact, LifecycleError> {
    let id = job.descriptor.id();
    let work_dir = self.settings.layout.work_dir(&job.key);

    info!(package = %id, role = ?job.role, "starting lifecycle");
    let result = self.run_steps(&job, &id, &work_dir).await;

    if let Err(e) = remove_dir_if_exists(&work_dir) {
      warn!(package = %id, path = ?work_dir, error = %e, "failed to clean work directory");
    }

    match &result {
      Ok(artifact) => {
        self.board.advance(&id, NodeState::Published);
        info!(package = %id, libs = ?artifact.libs, "package published");
      }
      Err(e) => {
        self.board.advance(&id, NodeState::Failed(e.to_string()));
        error!(package = %id, step = %e.step(), error = %e, "lifecycle failed");
      }
    }
    result
  }

  async fn run_steps(&self, job: &NodeJob, id: &PackageId, work_dir: &Path) -> Result<Artifact, LifecycleError> {
    remove_dir_if_exists(work_dir).map_err(|e| LifecycleError::Fetch(e.into()))?;

    self.board.advance(id, NodeState::Fetching);
    let source_root = self.fetch(job, work_dir).await.map_err(LifecycleError::Fetch)?;

    let build_dir = match job.role {
      NodeRole::Dependency => work_dir.join("build"),
      NodeRole::Project => self.settings.project_build_dir(),
    };

    self.board.advance(id, NodeState::Configuring);
    self
      .configure(job, &source_root, &build_dir)
      .await
      .map_err(LifecycleError::Configure)?;

    self.board.advance(id, NodeState::Building);
    self.build(job, &build_dir).await.map_err(LifecycleError::Build)?;

    self.board.advance(id, NodeState::Packaging);
    self
      .package(job, &source_root, &build_dir, work_dir)
      .await
      .map_err(LifecycleError::Package)
  }

  async fn fetch(&self, job: &NodeJob, work_dir: &Path) -> Result<PathBuf, ToolError> {
    let descriptor = &job.descriptor;

    let base = match &descriptor.source {
      None if job.role == NodeRole::Project => self.settings.project_dir.clone(),
      None => return Err(ToolError::NoSource(descriptor.id().to_string())),
      Some(SourceLocator::Path { path }) => self.settings.project_dir.join(descriptor.expand(&path.to_string_lossy())),
      Some(SourceLocator::Sdk { name }) => self.sdk_dir(name)?.to_path_buf(),
      Some(SourceLocator::Archive { url, sha256 }) => {
        let source = RemoteSource::Archive {
          url: descriptor.expand(url),
          sha256: sha256.clone(),
        };
        self.fetch_remote(&source, work_dir).await?
      }
      Some(SourceLocator::Git { url, rev }) => {
        let source = RemoteSource::Git {
          url: descriptor.expand(url),
          rev: rev.as_deref().map(|r| descriptor.expand(r)),
        };
        self.fetch_remote(&source, work_dir).await?
      }
    };

    let root = match descriptor.source_subdir() {
      Some(subdir) => base.join(subdir),
      None => base,
    };
    if !root.is_dir() {
      return Err(ToolError::MissingSource(root));
    }
    debug!(package = %descriptor.id(), source = ?root, "sources ready");
    Ok(root)
  }

  async fn fetch_remote(&self, source: &RemoteSource, work_dir: &Path) -> Result<PathBuf, ToolError> {
    let dest = work_dir.join("src");
    self.fetcher.fetch(source, &dest).await?;
    Ok(dest)
  }

  fn sdk_dir(&self, name: &str) -> Result<&Path, ToolError> {
    self
      .settings
      .sdks
      .get(name)
      .map(PathBuf::as_path)
      .ok_or_else(|| ToolError::SdkNotConfigured { name: name.to_string() })
  }

  async fn configure(&self, job: &NodeJob, source_root: &Path, build_dir: &Path) -> Result<(), ToolError> {
    let descriptor = &job.descriptor;

    if let Some(SourceLocator::Sdk { name }) = &descriptor.source {
      check_sdk_version(name, self.sdk_dir(name)?, &descriptor.version)?;
    }

    match &descriptor.build {
      BuildKind::CMake { .. } => {
        let prefixes: Vec<PathBuf> = job.dependencies.iter().map(|a| a.package_dir.clone()).collect();
        let request = ConfigureRequest {
          source_dir: source_root.to_path_buf(),
          build_dir: build_dir.to_path_buf(),
          args: cmake_args(descriptor, self.settings.variant, &prefixes),
        };
        self.tool.configure(&request).await?;
      }
      BuildKind::HeaderOnly | BuildKind::Prebuilt => {
        debug!(package = %descriptor.id(), "nothing to configure");
      }
    }
    Ok(())
  }

  async fn build(&self, job: &NodeJob, build_dir: &Path) -> Result<(), ToolError> {
    if matches!(job.descriptor.build, BuildKind::CMake { .. }) {
      self
        .tool
        .build(build_dir, self.settings.variant, self.settings.build_jobs)
        .await?;
    }
    Ok(())
  }

  async fn package(
    &self,
    job: &NodeJob,
    source_root: &Path,
    build_dir: &Path,
    work_dir: &Path,
  ) -> Result<Artifact, ToolError> {
    let descriptor = &job.descriptor;
    let stage = work_dir.join("stage");
    tokio::fs::create_dir_all(&stage).await?;

    if matches!(descriptor.build, BuildKind::CMake { .. }) {
      self.tool.install(build_dir, &stage, self.settings.variant).await?;
    }
    for rule in &descriptor.package {
      package::apply_copy_rule(rule, descriptor, source_root, &stage)?;
    }

    let os = self.settings.platform.os;
    match job.role {
      NodeRole::Project => {
        let install_dir = self.settings.project_install_dir();
        move_dir(&stage, &install_dir)?;
        Ok(package::describe_artifact(&install_dir, descriptor, os))
      }
      NodeRole::Dependency => {
        let package_dir = self.settings.layout.package_dir(&job.key);
        move_dir(&stage, &package_dir)?;

        let published = write_marker(&package_dir, &job.key)
          .map_err(|e| ToolError::Marker(e.to_string()))
          .and_then(|()| {
            let artifact = package::describe_artifact(&package_dir, descriptor, os);
            self.index.publish(job.key.clone(), artifact.clone())?;
            Ok(artifact)
          });

        if published.is_err()
          && let Err(e) = remove_dir_if_exists(&package_dir)
        {
          warn!(path = ?package_dir, error = %e, "failed to remove unpublished package");
        }
        published
      }
    }
  }
}

/// An SDK directory is named after its version (`.../VulkanSDK/1.3.216.0`), or
/// is a per-architecture subdirectory of one (`.../1.3.216.0/x86_64`, as the
/// Linux SDK's `setup-env.sh` exports it).
fn check_sdk_version(name: &str, sdk_dir: &Path, expected: &str) -> Result<(), ToolError> {
  let component = |path: Option<&Path>| {
    path
      .and_then(Path::file_name)
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default()
  };
  let found = component(Some(sdk_dir));
  if found == expected || component(sdk_dir.parent()) == expected {
    return Ok(());
  }
  Err(ToolError::SdkVersionMismatch {
    name: name.to_string(),
    path: sdk_dir.to_path_buf(),
    expected: expected.to_string(),
    found,
  })
}
