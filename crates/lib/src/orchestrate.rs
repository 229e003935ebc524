//! Top-level build flow.
//!
//! One run goes: resolve the dependency graph from the project descriptor and
//! the recipe directory, lock and open the artifact root, plan every node,
//! schedule the build (dependencies first, the project last) and, when all of
//! that succeeded, compile the project's shaders.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::{ArtifactIndex, ArtifactLockError, ArtifactRootLock, LockMode, PublishError, StoreLayout};
use crate::config::{ConfigError, ForgeConfig};
use crate::graph::{DependencyGraph, GraphError};
use crate::lifecycle::{
  BuildTool, CMakeTool, DefaultFetcher, LifecycleExecutor, LifecycleSettings, NodeState, SourceFetcher, StateBoard,
};
use crate::package::{PackageId, RecipeRepository};
use crate::schedule::{BuildPlan, ScheduleReport, Scheduler};
use crate::shader::{GlslcCompiler, ShaderCompiler, ShaderError, ShaderReport, compile_all, discover};
use crate::util::hash::HashError;

#[derive(Debug, Error)]
pub enum OrchestrateError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Lock(#[from] ArtifactLockError),

  #[error(transparent)]
  Publish(#[from] PublishError),

  #[error("failed to fingerprint package options: {0}")]
  Fingerprint(#[from] HashError),

  #[error(transparent)]
  Shader(#[from] ShaderError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  pub skip_shaders: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
  pub id: PackageId,
  pub state: NodeState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub plan: BuildPlan,
  pub schedule: ScheduleReport,
  /// `None` when the shader stage did not run.
  pub shaders: Option<ShaderReport>,
  pub states: Vec<NodeStatus>,
  #[serde(skip)]
  pub elapsed: Duration,
}

impl RunReport {
  pub fn is_success(&self) -> bool {
    self.schedule.is_success() && self.shaders.as_ref().is_none_or(ShaderReport::is_success)
  }
}

pub struct Orchestrator<F, B, C> {
  config: ForgeConfig,
  fetcher: Arc<F>,
  tool: Arc<B>,
  compiler: Arc<C>,
}

impl Orchestrator<DefaultFetcher, CMakeTool, GlslcCompiler> {
  /// Orchestrator driving the real tools named in `config`.
  pub fn from_config(config: ForgeConfig) -> Self {
    let layout = StoreLayout::new(&config.build.artifact_root);
    let fetcher = DefaultFetcher::new(layout.downloads_dir());
    let tool = CMakeTool::new(&config.tools.cmake, config.tools.generator.clone());
    let compiler = GlslcCompiler::new(&config.shaders.compiler, config.shaders.args.clone());
    Self::with_collaborators(config, fetcher, tool, compiler)
  }
}

impl<F: SourceFetcher, B: BuildTool, C: ShaderCompiler> Orchestrator<F, B, C> {
  pub fn with_collaborators(config: ForgeConfig, fetcher: F, tool: B, compiler: C) -> Self {
    Self {
      config,
      fetcher: Arc::new(fetcher),
      tool: Arc::new(tool),
      compiler: Arc::new(compiler),
    }
  }

  pub fn config(&self) -> &ForgeConfig {
    &self.config
  }

  pub fn layout(&self) -> StoreLayout {
    StoreLayout::new(&self.config.build.artifact_root)
  }

  pub fn resolve_graph(&self) -> Result<DependencyGraph, GraphError> {
    let recipes = RecipeRepository::new(&self.config.build.recipes);
    DependencyGraph::build(self.config.project.clone(), &recipes)
  }

  /// Open the artifact index under a shared lock, for read-only commands.
  pub fn open_index(&self) -> Result<ArtifactIndex, OrchestrateError> {
    let layout = self.layout();
    let _lock = ArtifactRootLock::acquire(layout.root(), LockMode::Shared, "status")?;
    Ok(ArtifactIndex::open(&layout)?)
  }

  pub fn plan(&self, graph: &DependencyGraph, index: &ArtifactIndex) -> Result<BuildPlan, OrchestrateError> {
    Ok(BuildPlan::compute(
      graph,
      self.config.build.platform,
      self.config.build.variant,
      index,
    )?)
  }

  pub async fn run(&self, options: RunOptions) -> Result<RunReport, OrchestrateError> {
    let started = Instant::now();
    let graph = self.resolve_graph()?;

    let layout = self.layout();
    let _lock = ArtifactRootLock::acquire(layout.root(), LockMode::Exclusive, "build")?;
    let index = Arc::new(ArtifactIndex::open(&layout)?);
    let plan = self.plan(&graph, &index)?;

    info!(
      project = %graph.root().id(),
      nodes = plan.len(),
      cached = plan.nodes.iter().filter(|n| n.cached).count(),
      variant = %self.config.build.variant,
      platform = %self.config.build.platform,
      "starting build"
    );

    let board = Arc::new(StateBoard::new(graph.topological_order()));
    let settings = LifecycleSettings {
      layout,
      platform: self.config.build.platform,
      variant: self.config.build.variant,
      build_jobs: self.config.build.build_jobs,
      project_dir: self.config.project_dir.clone(),
      sdks: self.config.sdks.clone(),
    };
    let executor = LifecycleExecutor::new(
      Arc::clone(&self.fetcher),
      Arc::clone(&self.tool),
      index,
      Arc::clone(&board),
      Arc::new(settings),
    );
    let schedule = Scheduler::new(Arc::new(executor), self.config.build.jobs)
      .run(&graph, &plan)
      .await;

    let shaders = if !schedule.is_success() {
      None
    } else if options.skip_shaders || !self.config.shaders.enabled {
      info!("shader stage disabled");
      None
    } else {
      Some(self.compile_shaders().await?)
    };

    let states = board
      .snapshot()
      .into_iter()
      .map(|(id, state)| NodeStatus { id, state })
      .collect();

    let report = RunReport {
      plan,
      schedule,
      shaders,
      states,
      elapsed: started.elapsed(),
    };
    if report.is_success() {
      info!(elapsed = ?report.elapsed, "build finished");
    } else {
      warn!(elapsed = ?report.elapsed, "build finished with failures");
    }
    Ok(report)
  }

  /// Discover and compile every shader below the configured media directory.
  pub async fn compile_shaders(&self) -> Result<ShaderReport, OrchestrateError> {
    let output_dir = self.config.shader_output_dir();
    let items = discover(&self.config.shaders.media_dir, &output_dir)?;
    info!(count = items.len(), output = ?output_dir, "compiling shaders");
    Ok(compile_all(Arc::clone(&self.compiler), items, self.config.build.jobs).await)
  }
}
