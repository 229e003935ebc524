//! Project configuration (`forge.toml`).
//!
//! The file is read once at startup. Relative paths are resolved against the
//! directory holding the file, and SDK locations given as environment
//! variables are looked up here, so nothing downstream reads the environment
//! mid-run.
//!
//! ```toml
//! [project]
//! name = "vulkan-renderer"
//! version = "0.1.0"
//! requires = ["glfw/3.3.4", "glm/0.9.9.8"]
//!
//! [build]
//! variant = "release"
//! jobs = 4
//!
//! [shaders]
//! media_dir = "media/shaders"
//!
//! [sdks]
//! vulkan = { env = "VULKAN_SDK" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::package::{BuildVariant, PackageDescriptor};
use crate::platform::Platform;
use crate::platform::paths::default_artifact_root;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid configuration {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("invalid value for {field}: {message}")]
  InvalidValue { field: &'static str, message: String },

  #[error("unsupported host platform; set build.platform explicitly")]
  UnsupportedPlatform,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawBuild {
  platform: Option<Platform>,
  variant: Option<BuildVariant>,
  jobs: Option<usize>,
  build_jobs: Option<usize>,
  artifact_root: Option<PathBuf>,
  recipes: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawTools {
  cmake: Option<PathBuf>,
  generator: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawShaders {
  enabled: bool,
  compiler: Option<PathBuf>,
  media_dir: Option<PathBuf>,
  output_dir: Option<PathBuf>,
  args: Vec<String>,
}

impl Default for RawShaders {
  fn default() -> Self {
    Self {
      enabled: true,
      compiler: None,
      media_dir: None,
      output_dir: None,
      args: Vec::new(),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SdkEntry {
  Path(PathBuf),
  Env { env: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
  project: PackageDescriptor,
  #[serde(default)]
  build: RawBuild,
  #[serde(default)]
  tools: RawTools,
  #[serde(default)]
  shaders: RawShaders,
  #[serde(default)]
  sdks: BTreeMap<String, SdkEntry>,
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
  pub platform: Platform,
  pub variant: BuildVariant,
  /// Nodes built at the same time.
  pub jobs: usize,
  /// Parallelism passed to each build tool invocation.
  pub build_jobs: usize,
  pub artifact_root: PathBuf,
  pub recipes: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ToolsConfig {
  pub cmake: PathBuf,
  pub generator: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShaderConfig {
  pub enabled: bool,
  pub compiler: PathBuf,
  pub args: Vec<String>,
  pub media_dir: PathBuf,
  /// Explicit output directory; `None` means next to the project executable.
  pub output_dir: Option<PathBuf>,
}

/// CLI-level overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
  pub jobs: Option<usize>,
  pub variant: Option<BuildVariant>,
  pub artifact_root: Option<PathBuf>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
  pub path: PathBuf,
  pub project_dir: PathBuf,
  pub project: PackageDescriptor,
  pub build: BuildConfig,
  pub tools: ToolsConfig,
  pub shaders: ShaderConfig,
  pub sdks: BTreeMap<String, PathBuf>,
}

impl ForgeConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Self::parse(&content, &path)
  }

  /// Parse `content` as if it were read from `path`.
  pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

    let project_dir = path
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .map(Path::to_path_buf)
      .unwrap_or_else(|| PathBuf::from("."));
    let resolve = |p: PathBuf| if p.is_absolute() { p } else { project_dir.join(p) };

    let platform = match raw.build.platform {
      Some(platform) => platform,
      None => Platform::current().ok_or(ConfigError::UnsupportedPlatform)?,
    };
    let jobs = positive("build.jobs", raw.build.jobs)?.unwrap_or_else(default_jobs);
    let build_jobs = positive("build.build_jobs", raw.build.build_jobs)?.unwrap_or(jobs);

    let build = BuildConfig {
      platform,
      variant: raw.build.variant.unwrap_or_default(),
      jobs,
      build_jobs,
      artifact_root: raw.build.artifact_root.map(&resolve).unwrap_or_else(default_artifact_root),
      recipes: resolve(raw.build.recipes.unwrap_or_else(|| PathBuf::from("recipes"))),
    };

    let tools = ToolsConfig {
      cmake: raw.tools.cmake.map(resolve_program(&project_dir)).unwrap_or_else(|| PathBuf::from("cmake")),
      generator: raw.tools.generator,
    };

    let shaders = ShaderConfig {
      enabled: raw.shaders.enabled,
      compiler: raw
        .shaders
        .compiler
        .map(resolve_program(&project_dir))
        .unwrap_or_else(|| PathBuf::from("glslc")),
      args: raw.shaders.args,
      media_dir: resolve(raw.shaders.media_dir.unwrap_or_else(|| PathBuf::from("media/shaders"))),
      output_dir: raw.shaders.output_dir.map(&resolve),
    };

    let mut sdks = BTreeMap::new();
    for (name, entry) in raw.sdks {
      match entry {
        SdkEntry::Path(sdk_path) => {
          sdks.insert(name, resolve(sdk_path));
        }
        SdkEntry::Env { env } => match std::env::var_os(&env) {
          Some(value) if !value.is_empty() => {
            debug!(sdk = %name, env = %env, "sdk location from environment");
            sdks.insert(name, PathBuf::from(value));
          }
          _ => warn!(sdk = %name, env = %env, "sdk environment variable is not set"),
        },
      }
    }

    Ok(Self {
      path: path.to_path_buf(),
      project_dir: project_dir.clone(),
      project: raw.project,
      build,
      tools,
      shaders,
      sdks,
    })
  }

  pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
    if let Some(jobs) = positive("--jobs", overrides.jobs)? {
      self.build.jobs = jobs;
    }
    if let Some(variant) = overrides.variant {
      self.build.variant = variant;
    }
    if let Some(root) = overrides.artifact_root {
      self.build.artifact_root = root;
    }
    Ok(())
  }

  /// Build directory of the project for the configured variant.
  pub fn project_build_dir(&self) -> PathBuf {
    self.project_dir.join("build").join(self.build.variant.as_str())
  }

  /// Where compiled shaders go: the configured directory, or the project's
  /// installed `bin/` for the current variant.
  pub fn shader_output_dir(&self) -> PathBuf {
    self
      .shaders
      .output_dir
      .clone()
      .unwrap_or_else(|| self.project_build_dir().join("install").join("bin"))
  }
}

fn positive(field: &'static str, value: Option<usize>) -> Result<Option<usize>, ConfigError> {
  match value {
    Some(0) => Err(ConfigError::InvalidValue {
      field,
      message: "must be at least 1".to_string(),
    }),
    other => Ok(other),
  }
}

fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Programs given as bare names are looked up on `PATH`; anything with a
/// directory component is resolved like other paths.
fn resolve_program(project_dir: &Path) -> impl Fn(PathBuf) -> PathBuf + '_ {
  move |program: PathBuf| {
    if program.is_absolute() || program.components().count() == 1 {
      program
    } else {
      project_dir.join(program)
    }
  }
}
