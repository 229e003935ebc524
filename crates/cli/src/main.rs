mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nativeforge_lib::consts::CONFIG_FILENAME;
use nativeforge_lib::package::BuildVariant;

use crate::cmd::BuildArgs;

/// nforge - build native dependencies, the project and its shaders
#[derive(Parser)]
#[command(name = "nforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the project configuration
  #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
  config: PathBuf,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every dependency, then the project, then its shaders
  Build {
    /// Maximum number of packages built at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Build variant (debug, release, relwithdebinfo, minsizerel)
    #[arg(long)]
    variant: Option<BuildVariant>,

    /// Override the artifact root
    #[arg(long)]
    artifact_root: Option<PathBuf>,

    /// Do not compile shaders after the build
    #[arg(long)]
    skip_shaders: bool,

    /// Output the run report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show the resolved dependency graph
  Graph {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Compile the project's shaders only
  Shaders {
    /// Maximum number of compiler processes at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show the build plan and which artifacts are already published
  Status {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show platform, tool and path information
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_env("NFORGE_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      jobs,
      variant,
      artifact_root,
      skip_shaders,
      json,
    } => cmd::cmd_build(
      &cli.config,
      BuildArgs {
        jobs,
        variant,
        artifact_root,
        skip_shaders,
      },
      cli.verbose,
      json,
    ),
    Commands::Graph { json } => cmd::cmd_graph(&cli.config, json),
    Commands::Shaders { jobs, json } => cmd::cmd_shaders(&cli.config, jobs, json),
    Commands::Status { json } => cmd::cmd_status(&cli.config, cli.verbose, json),
    Commands::Info => cmd::cmd_info(&cli.config),
  }
}
